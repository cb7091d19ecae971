pub mod modal;
pub mod mode;

pub use modal::{ModalToken, next_modal_id};
pub use mode::{FocusMode, ModeOptions, Presentation};
