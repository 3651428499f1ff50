use serde::{Deserialize, Serialize};
use vigil_worker::TaskClass;

/// Editor event or intent that triggered an analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
	/// `.` and similar member-access triggers.
	MemberSelect,
	/// Cursor movement next to a brace.
	MatchBraces,
	/// Close-paren: highlight the pair and refresh the method tip.
	MatchBracesAndMethodTip,
	/// Idle-triggered check of the whole file.
	FullTypeCheck,
	/// Explicit completion (ctrl-space).
	CompleteWord,
	/// Explicit member list (ctrl-j).
	DisplayMemberList,
	/// Mouse hover.
	QuickInfo,
	/// Open-paren, comma or close-paren inside an argument list.
	MethodTip,
	/// Go to definition.
	Goto,
	/// Parse only, without type checking (e.g. a different file was opened).
	ParseFile,
}

impl Reason {
	pub const ALL: [Reason; 10] = [
		Reason::MemberSelect,
		Reason::MatchBraces,
		Reason::MatchBracesAndMethodTip,
		Reason::FullTypeCheck,
		Reason::CompleteWord,
		Reason::DisplayMemberList,
		Reason::QuickInfo,
		Reason::MethodTip,
		Reason::Goto,
		Reason::ParseFile,
	];

	/// Scheduling lane used for queue coalescing.
	pub const fn class(self) -> TaskClass {
		match self {
			Self::FullTypeCheck | Self::ParseFile => TaskClass::Background,
			_ => TaskClass::Interactive,
		}
	}

	/// Whether a completed request of this reason refreshes the recency cache.
	pub const fn updates_recent_result(self) -> bool {
		matches!(self, Self::FullTypeCheck | Self::ParseFile)
	}

	/// Whether a completed result is delivered even when newer work of the
	/// same lane is already queued.
	pub const fn always_delivered(self) -> bool {
		matches!(self, Self::FullTypeCheck)
	}

	/// Default fast-path eligibility: reasons whose answer can be computed
	/// from a recent, possibly out-of-date, full check.
	pub const fn reuses_recent_result(self) -> bool {
		matches!(self, Self::MatchBraces | Self::MatchBracesAndMethodTip | Self::MethodTip | Self::QuickInfo)
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::MemberSelect => "member-select",
			Self::MatchBraces => "match-braces",
			Self::MatchBracesAndMethodTip => "match-braces-and-method-tip",
			Self::FullTypeCheck => "full-type-check",
			Self::CompleteWord => "complete-word",
			Self::DisplayMemberList => "display-member-list",
			Self::QuickInfo => "quick-info",
			Self::MethodTip => "method-tip",
			Self::Goto => "goto",
			Self::ParseFile => "parse-file",
		}
	}
}

impl std::fmt::Display for Reason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_full_check_and_parse_are_background() {
		for reason in Reason::ALL {
			let expected = if matches!(reason, Reason::FullTypeCheck | Reason::ParseFile) {
				TaskClass::Background
			} else {
				TaskClass::Interactive
			};
			assert_eq!(reason.class(), expected, "{reason}");
		}
	}

	#[test]
	fn only_full_check_bypasses_suppression() {
		let always: Vec<_> = Reason::ALL.into_iter().filter(|r| r.always_delivered()).collect();
		assert_eq!(always, vec![Reason::FullTypeCheck]);
	}

	#[test]
	fn serde_names_match_display() {
		#[derive(Deserialize)]
		struct Wrapper {
			reason: Reason,
		}
		for reason in Reason::ALL {
			let parsed: Wrapper = toml::from_str(&format!("reason = \"{reason}\"")).unwrap();
			assert_eq!(parsed.reason, reason);
		}
	}
}
