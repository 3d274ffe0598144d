//! Venue clients: the shared market capability plus live and paper implementations.

mod client;
mod paper_client;
mod rest_client;
mod types;

pub use client::{MarketClient, OrderSide, OrderState};
#[cfg(test)]
pub use client::OrderResponse;
pub use paper_client::{PaperClient, PaperConfig};
pub use rest_client::RestClient;
