//! Writes core snapshots into the page.

use crate::dom::{self, Elements};
use crate::state;
use pf_api_types::{Address, ContributionSnapshot, FunderEntry, PoolSnapshot, Tier};
use pf_dapp_core::SessionState;
use pf_dapp_core::format;
use pf_dapp_core::funding::RewardPreview;
use web_sys::Element;

const NO_FUNDERS: &str = "No contributors yet. Be the first!";
const CONNECT_TO_SEE_FUNDERS: &str = "Connect wallet to see contributors";

/// Disconnected defaults, shown before anything loads.
pub fn reset(els: &Elements) {
    session(
        els,
        &SessionState {
            address: None,
            is_connected: false,
            explicitly_disconnected: false,
        },
    );
    contribution(els, &ContributionSnapshot::default());
    placeholder(&els.funders_list, CONNECT_TO_SEE_FUNDERS);
    dom::set_visible(&els.rewards_preview, false);
}

/// `0x12...abcd`, as the connect button shows it.
fn button_label(address: &Address) -> String {
    let text = address.as_str();
    format!("{}...{}", &text[..4], &text[text.len() - 4..])
}

pub fn session(els: &Elements, state: &SessionState) {
    state::set_connected(state.is_connected);
    match &state.address {
        Some(address) if state.is_connected => {
            dom::set_text(&els.connect_btn, &button_label(address));
            dom::add_class(&els.connect_btn, "connected");
            dom::set_text(&els.fund_btn, "Fund Project");
            let _ = els.fund_btn.remove_attribute("disabled");
        }
        _ => {
            dom::set_text(&els.connect_btn, "Connect");
            dom::remove_class(&els.connect_btn, "connected");
            dom::set_text(&els.fund_btn, "Connect Wallet to Fund");
            let _ = els.fund_btn.set_attribute("disabled", "");
            dom::set_visible(&els.rewards_preview, false);
        }
    }
}

pub fn contribution(els: &Elements, snapshot: &ContributionSnapshot) {
    dom::set_text(&els.user_contribution, &format::usd(snapshot.user_usd_contributed));
    dom::set_text(&els.current_tier, snapshot.tier.label());
    tier_highlight(els, snapshot.tier);
}

fn tier_highlight(els: &Elements, tier: Tier) {
    for (el, own, color) in [
        (&els.bronze_tier, Tier::Bronze, "#cd7f32"),
        (&els.silver_tier, Tier::Silver, "#c0c0c0"),
        (&els.gold_tier, Tier::Gold, "#ffd700"),
    ] {
        let active = own == tier;
        dom::toggle_class(el, "active", active);
        if active {
            dom::set_style(el, "transform", "translateY(-5px)");
            dom::set_style(el, "border", &format!("1px solid {color}"));
        } else {
            dom::set_style(el, "transform", "translateY(0)");
            dom::set_style(el, "border", "1px solid rgba(255, 255, 255, 0.1)");
        }
    }
}

pub fn pool(els: &Elements, snapshot: &PoolSnapshot) {
    let token = state::token();
    let raised = format!(
        "{} ETH",
        format::ether(snapshot.total_raised_wei, format::TOTAL_RAISED_WIDTH)
    );
    dom::set_text(&els.total_raised, &raised);
    dom::set_text(&els.total_raised_card, &raised);
    dom::set_text(
        &els.pica_available,
        &format::token(snapshot.reward_token_balance, token.decimals, format::REWARD_BALANCE_WIDTH),
    );
    dom::set_text(&els.nfts_minted, &snapshot.nft_supply.to_string());
    dom::set_text(&els.total_funders, &snapshot.distinct_funders.to_string());
    funders(&els.funders_list, &snapshot.funder_leaderboard);
}

fn funders(list: &Element, leaderboard: &[FunderEntry]) {
    if leaderboard.is_empty() {
        let text = if state::connected() { NO_FUNDERS } else { CONNECT_TO_SEE_FUNDERS };
        placeholder(list, text);
        return;
    }
    list.set_inner_html("");
    for entry in leaderboard {
        let Some(row) = funder_row(entry) else {
            continue;
        };
        let _ = list.append_child(&row);
    }
}

fn funder_row(entry: &FunderEntry) -> Option<Element> {
    let row = dom::create_element("div")?;
    row.set_class_name("funder-row");

    let address = dom::create_element("span")?;
    address.set_class_name("funder-address");
    dom::set_text(&address, &entry.address.short());

    let amount = dom::create_element("span")?;
    amount.set_class_name("funder-amount");
    dom::set_text(
        &amount,
        &format!("{} ETH", format::ether(entry.cumulative_wei, format::FUNDER_AMOUNT_WIDTH)),
    );

    row.append_child(&address).ok()?;
    row.append_child(&amount).ok()?;
    Some(row)
}

fn placeholder(list: &Element, text: &str) {
    list.set_inner_html("");
    if let Some(p) = dom::create_element("p") {
        p.set_class_name("funders-empty");
        dom::set_text(&p, text);
        let _ = list.append_child(&p);
    }
}

pub fn preview(els: &Elements, preview: Option<&RewardPreview>) {
    let Some(preview) = preview else {
        dom::set_visible(&els.rewards_preview, false);
        return;
    };
    let token = state::token();
    dom::set_text(&els.pica_reward, &preview.pica_display(&token.symbol));
    dom::set_text(&els.usd_value, &preview.usd_display());
    dom::set_text(&els.nft_preview, &preview.status.message());
    dom::set_visible(&els.rewards_preview, true);
}

/// `Some(label)` while a transaction is in flight; `None` restores the idle state.
pub fn fund_button_busy(els: &Elements, label: Option<&str>) {
    match label {
        Some(label) => {
            let _ = els.fund_btn.set_attribute("disabled", "");
            dom::set_text(&els.fund_btn, label);
        }
        None if state::connected() => {
            let _ = els.fund_btn.remove_attribute("disabled");
            dom::set_text(&els.fund_btn, "Fund Project");
        }
        None => {
            let _ = els.fund_btn.set_attribute("disabled", "");
            dom::set_text(&els.fund_btn, "Connect Wallet to Fund");
        }
    }
}
