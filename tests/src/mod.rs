#[cfg(test)]
pub mod purchase_flow_tests;
#[cfg(test)]
pub mod scenario_tests;
#[cfg(test)]
pub mod utils;
