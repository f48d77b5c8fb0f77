pub mod bindings;

pub mod controller;

pub mod deployment;

pub mod dispatch;

pub mod error;

pub mod gateway;

pub mod persistence;

pub mod session;

pub mod test_helpers;

pub mod view;

pub mod wallets;

pub mod doors_types {
    use fuels::macros::abigen;

    abigen!(Contract(
        name = "DoorsContract",
        abi = "doors/out/release/doors-abi.json"
    ));
}

pub use controller::GameController;
pub use error::GameError;
pub use gateway::{
    DoorsGateway,
    PlayerRecord,
};
pub use session::{
    Session,
    SessionManager,
};
