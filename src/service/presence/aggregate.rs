use serde_json::{Value, json};

use super::status::Status;

/// Folds a resource's active statuses into a single presence document:
/// the highest-priority status wins; among statuses tied for the highest
/// priority, an online status wins over an offline one.
#[must_use]
pub fn aggregate_status(statuses: &[(String, Status)]) -> Value {
	let mut max_priority: Option<i64> = None;
	let mut aggregate = json!({"status": "offline"});

	for (_, status) in statuses {
		match max_priority {
			| None => {
				max_priority = Some(status.priority);
				aggregate = status.presence.clone();
			},
			| Some(current) if status.priority > current => {
				max_priority = Some(status.priority);
				aggregate = status.presence.clone();
			},
			| Some(current) if status.priority == current => {
				let aggregate_offline =
					aggregate.get("status").and_then(Value::as_str) == Some("offline");
				if aggregate_offline && status.is_online() {
					aggregate = status.presence.clone();
				}
			},
			| Some(_) => {},
		}
	}

	json!({"presence": aggregate})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn status(online: bool, priority: i64) -> Status {
		Status::new(
			json!({"status": if online { "online" } else { "offline" }}),
			u64::MAX,
			priority,
		)
	}

	#[test]
	fn empty_resource_is_offline() {
		let aggregated = aggregate_status(&[]);
		assert_eq!(aggregated, json!({"presence": {"status": "offline"}}));
	}

	#[test]
	fn single_online_publisher() {
		let statuses = vec![("t1".to_owned(), status(true, 0))];
		assert_eq!(
			aggregate_status(&statuses),
			json!({"presence": {"status": "online"}})
		);
	}

	#[test]
	fn higher_priority_wins_even_if_offline() {
		let statuses = vec![
			("t1".to_owned(), status(true, 0)),
			("t2".to_owned(), status(false, 5)),
		];
		assert_eq!(
			aggregate_status(&statuses),
			json!({"presence": {"status": "offline"}})
		);
	}

	#[test]
	fn equal_priority_online_wins_tie() {
		let statuses = vec![
			("t1".to_owned(), status(false, 0)),
			("t2".to_owned(), status(true, 0)),
		];
		assert_eq!(
			aggregate_status(&statuses),
			json!({"presence": {"status": "online"}})
		);
	}

	#[test]
	fn aggregation_is_commutative_under_permutation() {
		let a = vec![
			("t1".to_owned(), status(false, 0)),
			("t2".to_owned(), status(true, 0)),
			("t3".to_owned(), status(false, 5)),
		];
		let mut b = a.clone();
		b.reverse();
		assert_eq!(aggregate_status(&a), aggregate_status(&b));
	}
}
