// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Interflux Contributors

use interflux_core::{Change, Context, Error, PropertyId};

use crate::options::ConflictBehavior;

/// Stage 1 of an optimistic commit (spec §4.5): compares each pending
/// change's captured `old_value` against the property's actual current
/// stored value, detecting writes made by someone else since capture.
pub struct ConflictOracle;

impl ConflictOracle {
	/// Fails on the first conflicting property under `FailOnConflict`, or
	/// succeeds if every pending change is still based on the current
	/// stored value (or conflicts are being ignored).
	pub fn check(context: &Context, changes: &[Change], conflict_behavior: ConflictBehavior) -> Result<(), Error> {
		if conflict_behavior == ConflictBehavior::Ignore {
			return Ok(());
		}

		match Self::conflicting_properties(context, changes).into_iter().next() {
			Some(property) => Err(Error::Conflict { property }),
			None => Ok(()),
		}
	}

	/// Every property with a stored value that has drifted from its
	/// pending `old_value`, regardless of conflict-behavior — used by
	/// tests that want to assert on the conflict set directly rather
	/// than only on the first-found error.
	pub fn conflicting_properties(context: &Context, changes: &[Change]) -> Vec<PropertyId> {
		changes
			.iter()
			.filter(|change| context.read_bypassing_transaction(&change.property) != change.old_value)
			.map(|change| change.property.clone())
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use interflux_core::test_utils::TestRegistry;
	use interflux_core::{ChangeContext, PropertyValue, SubjectId};

	use super::*;

	fn property(name: &str) -> PropertyId {
		PropertyId::new(SubjectId::new(), name)
	}

	#[test]
	fn conflicting_properties_lists_every_drifted_property_not_just_the_first() {
		let registry = std::sync::Arc::new(TestRegistry::new());
		let context = Context::new(registry);
		let first = property("FirstName");
		let last = property("LastName");
		context.write(&first, PropertyValue::Text("External".into())).unwrap();

		let changes = vec![
			Change::new(first.clone(), PropertyValue::Null, PropertyValue::Text("FromTx".into()), &ChangeContext::default()),
			Change::new(last.clone(), PropertyValue::Null, PropertyValue::Text("FromTx".into()), &ChangeContext::default()),
		];

		assert_eq!(ConflictOracle::conflicting_properties(&context, &changes), vec![first]);
	}

	#[test]
	fn check_fails_on_the_first_conflicting_property() {
		let registry = std::sync::Arc::new(TestRegistry::new());
		let context = Context::new(registry);
		let first = property("FirstName");
		context.write(&first, PropertyValue::Text("External".into())).unwrap();

		let changes = vec![Change::new(
			first.clone(),
			PropertyValue::Null,
			PropertyValue::Text("FromTx".into()),
			&ChangeContext::default(),
		)];

		let err = ConflictOracle::check(&context, &changes, ConflictBehavior::FailOnConflict).unwrap_err();
		assert_eq!(err, Error::Conflict { property: first });
	}
}
