use nanoid::nanoid;

/// Digits, letters, dash, dot — no underscore, to comply with the provider's
/// name rules (§4.5, §9 design notes).
const NAME_SUFFIX_ALPHABET: [char; 38] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm',
    'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
    '-', '.',
];

/// Builds a `{name_base}-{token}` name for a newly created instance. The
/// token is a short, collision-resistant suffix drawn from a restricted
/// character set (§4.5).
pub fn provisioned_name(name_base: &str) -> String {
    let token = nanoid!(8, &NAME_SUFFIX_ALPHABET);
    format!("{}-{}", name_base, token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_excludes_underscore() {
        for _ in 0..200 {
            let name = provisioned_name("web");
            assert!(name.starts_with("web-"));
            assert!(!name.contains('_'), "name {} contains underscore", name);
        }
    }
}
