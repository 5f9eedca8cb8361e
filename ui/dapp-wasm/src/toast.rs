//! Toast rendering for core notifications.

use crate::dom::{self, Elements};
use crate::state;
use gloo_timers::callback::Timeout;
use pf_api_types::{Notification, NotificationKind};
use tracing::warn;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::Element;

fn element_id(id: u64) -> String {
    format!("toast-{id}")
}

fn kind_class(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Success => "toast-success",
        NotificationKind::Error => "toast-error",
        NotificationKind::Info => "toast-info",
    }
}

pub fn remove(id: u64) {
    if let Some(el) = dom::by_id(&element_id(id)) {
        el.remove();
    }
}

pub fn show(els: &Elements, notification: &Notification) {
    let Some(toast) = build(notification) else {
        return;
    };
    if let Err(err) = els.toast_container.append_child(&toast) {
        warn!(id = notification.id, error = ?err, "could not show notification");
    }
    // Drops anything the new toast pushed out of the queue.
    sweep();

    // Expiry goes through the core so its queue and the page agree.
    let ttl = u32::try_from(notification.ttl_ms).unwrap_or(u32::MAX);
    Timeout::new(ttl, sweep).forget();
}

fn sweep() {
    if let Some(dapp) = state::dapp() {
        for id in dapp.expire_notifications() {
            remove(id);
        }
    }
}

fn build(notification: &Notification) -> Option<Element> {
    let toast = dom::create_element("div")?;
    toast.set_id(&element_id(notification.id));
    toast.set_class_name("toast");
    dom::add_class(&toast, kind_class(notification.kind));

    let title = dom::create_element("strong")?;
    dom::set_text(&title, &notification.title);
    let message = dom::create_element("span")?;
    dom::set_text(&message, &notification.message);

    let close = dom::create_element("button")?;
    close.set_class_name("toast-close");
    dom::set_text(&close, "×");
    let id = notification.id;
    let cb = Closure::wrap(Box::new(move |_: web_sys::MouseEvent| {
        if let Some(dapp) = state::dapp() {
            dapp.dismiss_notification(id);
        }
        remove(id);
    }) as Box<dyn FnMut(_)>);
    close
        .add_event_listener_with_callback("click", cb.as_ref().unchecked_ref())
        .ok()?;
    cb.forget();

    toast.append_child(&title).ok()?;
    toast.append_child(&message).ok()?;
    toast.append_child(&close).ok()?;
    Some(toast)
}
