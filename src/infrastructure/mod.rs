pub mod hosts;
#[cfg(test)]
pub mod loopback;
pub mod websocket;
