//! Discord presentation: controller buttons, embeds and the enqueue modal.

pub mod buttons;
pub mod embeds;
