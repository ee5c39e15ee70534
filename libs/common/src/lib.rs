pub mod amount;

pub mod interfaces {
    pub mod lazy_content_minter;
    pub mod payment_channel_hub;
    pub mod stream_amm;
    pub mod stream_token;
}

pub mod cache;
pub mod chain;
pub mod channel;
pub mod events;
pub mod network;
pub mod resilience;
pub mod store;
