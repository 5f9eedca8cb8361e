//! DOM element bindings.
//!
//! All fields are resolved once at startup. To add a new UI element, add a
//! field here and bind it in `Elements::bind()`.

use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, HtmlElement, HtmlInputElement};

// ── Helpers ──

pub fn window() -> Option<web_sys::Window> {
    web_sys::window()
}

fn doc() -> Option<Document> {
    window()?.document()
}

pub fn by_id(id: &str) -> Option<Element> {
    doc()?.get_element_by_id(id)
}

pub fn by_id_typed<T: JsCast>(id: &str) -> Option<T> {
    by_id(id).and_then(|e| e.dyn_into::<T>().ok())
}

pub fn create_element(tag: &str) -> Option<Element> {
    doc()?.create_element(tag).ok()
}

pub fn set_text(el: &Element, text: &str) {
    el.set_text_content(Some(text));
}

pub fn get_input_value(el: &HtmlInputElement) -> String {
    el.value().trim().to_string()
}

pub fn set_input_value(el: &HtmlInputElement, val: &str) {
    el.set_value(val);
}

pub fn add_class(el: &Element, cls: &str) {
    let _ = el.class_list().add_1(cls);
}

pub fn remove_class(el: &Element, cls: &str) {
    let _ = el.class_list().remove_1(cls);
}

pub fn toggle_class(el: &Element, cls: &str, force: bool) {
    let _ = el.class_list().toggle_with_force(cls, force);
}

pub fn set_style(el: &Element, property: &str, value: &str) {
    if let Some(el) = el.dyn_ref::<HtmlElement>() {
        let _ = el.style().set_property(property, value);
    }
}

pub fn set_visible(el: &Element, visible: bool) {
    set_style(el, "display", if visible { "block" } else { "none" });
}

pub fn now_ms() -> u64 {
    js_sys::Date::now() as u64
}

pub fn reload() {
    if let Some(window) = window() {
        let _ = window.location().reload();
    }
}

// ── Elements struct ──

/// Every element the page script touches.
/// Clone-friendly (all inner types are reference-counted via JS GC).
#[derive(Clone)]
pub struct Elements {
    // Wallet / funding form
    pub connect_btn: HtmlElement,
    pub fund_btn: HtmlElement,
    pub eth_amount: HtmlInputElement,

    // User panel
    pub user_contribution: Element,
    pub current_tier: Element,
    pub bronze_tier: Element,
    pub silver_tier: Element,
    pub gold_tier: Element,

    // Pool stats
    pub pica_available: Element,
    pub total_raised: Element,
    pub total_raised_card: Element,
    pub nfts_minted: Element,
    pub total_funders: Element,
    pub funders_list: Element,

    // Reward preview
    pub rewards_preview: Element,
    pub pica_reward: Element,
    pub usd_value: Element,
    pub nft_preview: Element,

    pub toast_container: Element,
}

macro_rules! get_el {
    ($id:expr) => {
        by_id($id).ok_or_else(|| JsValue::from_str(&format!("missing element #{}", $id)))?
    };
}

macro_rules! get_typed {
    ($ty:ty, $id:expr) => {
        by_id_typed::<$ty>($id)
            .ok_or_else(|| JsValue::from_str(&format!("missing element #{}", $id)))?
    };
}

impl Elements {
    pub fn bind() -> Result<Self, JsValue> {
        Ok(Self {
            connect_btn: get_typed!(HtmlElement, "connectBtn"),
            fund_btn: get_typed!(HtmlElement, "fundBtn"),
            eth_amount: get_typed!(HtmlInputElement, "ethAmount"),

            user_contribution: get_el!("userContribution"),
            current_tier: get_el!("currentTier"),
            bronze_tier: get_el!("bronzeTier"),
            silver_tier: get_el!("silverTier"),
            gold_tier: get_el!("goldTier"),

            pica_available: get_el!("picaAvailable"),
            total_raised: get_el!("totalRaised"),
            total_raised_card: get_el!("totalRaisedCard"),
            nfts_minted: get_el!("nftsMinted"),
            total_funders: get_el!("totalFunders"),
            funders_list: get_el!("fundersList"),

            rewards_preview: get_el!("rewardsPreview"),
            pica_reward: get_el!("picaReward"),
            usd_value: get_el!("usdValue"),
            nft_preview: get_el!("nftPreview"),

            toast_container: toast_container()?,
        })
    }
}

/// `#toastContainer`, created under `<body>` when the page has none.
fn toast_container() -> Result<Element, JsValue> {
    if let Some(existing) = by_id("toastContainer") {
        return Ok(existing);
    }
    let container = create_element("div")
        .ok_or_else(|| JsValue::from_str("cannot create toast container"))?;
    container.set_id("toastContainer");
    add_class(&container, "toast-container");
    let body = doc()
        .and_then(|d| d.body())
        .ok_or_else(|| JsValue::from_str("document has no body"))?;
    body.append_child(&container)?;
    Ok(container)
}
