//! Library crate for buzzdeck, the headless core of a quiz-buzzer competition
//! client: the session state machine, the controller HTTP/SSE client, and the
//! quota-tolerant settings store. A presentation layer renders the published
//! session views and feeds user intents back in.

pub mod config;
pub mod controller;
pub mod flow;
pub mod session;
pub mod store;
