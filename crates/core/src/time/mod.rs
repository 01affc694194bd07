pub mod jp_market;
