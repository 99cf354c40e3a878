/// Account and asset identifiers.
pub mod address;

/// Balance table, running deposit total and counters.
/// State is modified using events, which are created by validating requests
/// and can be reverted to roll an operation back.
pub mod ledger;

/// Conversion of native amounts into accounting units through a price source.
pub mod valuation;

/// Gate over the price source reference.
pub mod admin;

/// Movements of value between the vault and the outside world.
pub mod transfer;

/// Public deposit and withdrawal operations, composed from the modules above.
pub mod vault;

/// Initialization parameters.
pub mod config;

/// Typed operations parsed from scenario rows.
pub mod command;

/// Operation processor interface, plus "in memory" implementation that
/// runs a vault against a simulated world.
pub mod processor;

/// Scenario runner shared by the binary and the integration tests.
pub mod bin_utils;
