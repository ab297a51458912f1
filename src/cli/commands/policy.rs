use anyhow::Result;

use super::print_json;
use crate::workflows::policy_rules;

/// Print the permission table in evaluation order
pub fn execute() -> Result<()> {
    print_json(policy_rules())
}
