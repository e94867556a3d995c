pub mod alloy;

use ::alloy::providers::DynProvider;

/// Type erased provider used by every component talking to the node.
pub type AlloyProvider = DynProvider;
