use arrayvec::ArrayString;
use rand::RngExt;

pub fn string(length: usize) -> String {
	rand::rng()
		.sample_iter(&rand::distr::Alphanumeric)
		.take(length)
		.map(char::from)
		.collect()
}

#[inline]
pub fn string_array<const LENGTH: usize>() -> ArrayString<LENGTH> {
	let mut ret = ArrayString::<LENGTH>::new();
	rand::rng()
		.sample_iter(&rand::distr::Alphanumeric)
		.take(LENGTH)
		.map(char::from)
		.for_each(|c| ret.push(c));

	ret
}

/// Default length of a minted publication tag (`SIP-ETag`).
pub const TAG_LENGTH: usize = 10;

/// Mints a fresh publication tag.
#[must_use]
pub fn tag() -> String { string(TAG_LENGTH) }

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tag_has_expected_length() {
		assert_eq!(tag().len(), TAG_LENGTH);
	}

	#[test]
	fn tags_are_not_trivially_repeated() {
		assert_ne!(tag(), tag());
	}
}
