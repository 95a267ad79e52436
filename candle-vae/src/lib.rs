pub mod candle_aux_layers;
pub mod candle_data_loader;
pub mod candle_decoder_bernoulli;
pub mod candle_inference;
pub mod candle_loss_functions;
pub mod candle_model_encoder;
pub mod candle_model_traits;
pub mod candle_random;
pub mod candle_vae;
pub mod candle_vae_error;
pub mod candle_vae_inference;
pub mod cli;
pub mod common_io;
pub mod tensor_io;

pub use candle_core;
pub use candle_nn;
