//! # Sendloom Transport
//! Message delivery by driving a real browser session against WhatsApp Web
//! through a WebDriver endpoint (chromedriver). The engine only sees the
//! `Transport` trait from sendloom-core; everything here is replaceable.

pub mod webdriver;
pub mod whatsapp;

pub use whatsapp::WhatsAppWebTransport;
