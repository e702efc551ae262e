pub mod inventory;
pub mod qr_render;
pub mod redemption;
pub mod redemption_store;
pub mod token_codec;
