use rand::{distributions::Alphanumeric, thread_rng, Rng};

pub fn random_string(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}

/// Turns a title into a URL-safe permalink
pub fn permalink(title: &str) -> String {
    let mut result = String::with_capacity(title.len());
    let mut last_was_dash = true;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash {
            result.push('-');
            last_was_dash = true;
        }
    }

    let trimmed = result.trim_matches('-');

    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_permalink() {
        assert_eq!(permalink("Old Muppet Men Booing"), "old-muppet-men-booing");
        assert_eq!(permalink("emptytags"), "emptytags");
        assert_eq!(permalink("  Fête & Friends!  "), "f-te-friends");
        assert_eq!(permalink("***"), "untitled");
    }

    #[test]
    fn test_random_string_length() {
        assert_eq!(random_string(32).len(), 32);
        assert_ne!(random_string(32), random_string(32));
    }
}
