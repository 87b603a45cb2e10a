//! Well-known short names.

use std::collections::HashMap;

use lazy_static::lazy_static;

lazy_static! {
    /// Short name -> (name to load, cache alias).
    static ref WELL_KNOWN: HashMap<&'static str, (&'static str, &'static str)> = {
        let mut m = HashMap::new();
        m.insert("np", ("numpy", "np"));
        m.insert("pd", ("pandas", "pd"));
        m.insert("plt", ("matplotlib.pyplot", "plt"));
        m.insert("tf", ("tensorflow", "tf"));
        m.insert("cv2", ("opencv-python", "cv2"));
        m.insert("PIL", ("pillow", "PIL"));
        m.insert("sklearn", ("scikit-learn", "sklearn"));
        m
    };
}

/// Expand a short name to the name to load and the alias to cache under.
///
/// Unknown short names load under their own name with no alias.
pub fn expand(short: &str) -> (&str, Option<&'static str>) {
    match WELL_KNOWN.get(short) {
        Some(&(name, alias)) => (name, Some(alias)),
        None => (short, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand() {
        assert_eq!(expand("np"), ("numpy", Some("np")));
        assert_eq!(expand("sklearn"), ("scikit-learn", Some("sklearn")));
        assert_eq!(expand("requests"), ("requests", None));
    }
}
