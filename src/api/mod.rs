pub mod prices;
pub mod rpc;
pub mod transfers;

pub use prices::{JupiterPriceClient, PriceOracle, USDC_MINT, USDT_MINT};
pub use rpc::{RpcClient, RpcError};
pub use transfers::extract_spl_transfers;
