pub mod alert;
pub mod escalation;
pub mod event;
pub mod history;
pub mod note;
