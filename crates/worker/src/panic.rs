use std::any::Any;

/// Extracts the message from a caught panic payload.
///
/// Returns `None` for payloads that are neither `&'static str` nor `String`.
pub fn panic_message(payload: &(dyn Any + Send)) -> Option<String> {
	if let Some(msg) = payload.downcast_ref::<&'static str>() {
		return Some((*msg).to_string());
	}
	payload.downcast_ref::<String>().cloned()
}

#[cfg(test)]
mod tests {
	use std::panic::{AssertUnwindSafe, catch_unwind};

	use super::panic_message;

	#[test]
	fn extracts_static_str_payload() {
		let err = catch_unwind(|| panic!("boom-str")).unwrap_err();
		let msg = panic_message(err.as_ref()).expect("should carry a message");
		assert!(msg.contains("boom-str"), "expected 'boom-str', got: {msg}");
	}

	#[test]
	fn extracts_string_payload() {
		let err = catch_unwind(|| panic!("{}", String::from("boom-string"))).unwrap_err();
		let msg = panic_message(err.as_ref()).expect("should carry a message");
		assert!(msg.contains("boom-string"), "expected 'boom-string', got: {msg}");
	}

	#[test]
	fn returns_none_for_opaque_payload() {
		let err = catch_unwind(AssertUnwindSafe(|| std::panic::panic_any(42u32))).unwrap_err();
		assert!(panic_message(err.as_ref()).is_none());
	}
}
