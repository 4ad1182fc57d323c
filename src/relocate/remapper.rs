//! Applies an ordered relocation chain to names found in bytecode and
//! archive paths. The first relocator able to relocate a name wins.

use super::Relocator;

/// Namespaces owned by the platform itself; structural names inside them are
/// never touched.
const PLATFORM_PREFIXES: [&str; 3] = ["java/", "javax/", "jdk/"];

#[derive(Debug, Clone, Copy)]
pub struct SymbolRemapper<'a> {
    relocators: &'a [Relocator],
}

impl<'a> SymbolRemapper<'a> {
    pub fn new(relocators: &'a [Relocator]) -> Self {
        Self { relocators }
    }

    pub fn has_relocators(&self) -> bool {
        !self.relocators.is_empty()
    }

    pub fn relocators(&self) -> &'a [Relocator] {
        self.relocators
    }

    /// Maps an internal name or slash-separated path.
    ///
    /// Returns `None` for platform names, which must be left alone. Any other
    /// name yields `Some`, holding the original when no relocator applies.
    pub fn map_class_or_path_name(&self, name: &str) -> Option<String> {
        if PLATFORM_PREFIXES.iter().any(|p| name.starts_with(p)) {
            return None;
        }

        let (prefix, inner) = split_type_wrapper(name);
        let mapped = self
            .relocators
            .iter()
            .find(|r| r.can_relocate_path(inner))
            .map(|r| format!("{prefix}{}", r.relocate_path(inner)));

        Some(mapped.unwrap_or_else(|| name.to_string()))
    }

    /// Maps a string constant. Dotted class names are tried before paths;
    /// the result is never absent.
    pub fn map_embedded_string_value(&self, value: &str) -> String {
        let (prefix, inner) = split_type_wrapper(value);

        for relocator in self.relocators {
            if relocator.can_relocate_class(inner) {
                return format!("{prefix}{}", relocator.relocate_class(inner));
            }
            if relocator.can_relocate_path(inner) {
                return format!("{prefix}{}", relocator.relocate_path(inner));
            }
        }

        value.to_string()
    }

    /// Maps a resource path with its extension (everything from the first
    /// `.`) removed. Callers re-append the extension they need.
    pub fn map_resource_path(&self, path: &str) -> Option<String> {
        let stem = path.find('.').map_or(path, |dot| &path[..dot]);
        self.map_class_or_path_name(stem)
    }

    /// Maps a full path, falling back to the path itself for platform names.
    pub fn safe_map(&self, path: &str) -> String {
        self.map_class_or_path_name(path)
            .unwrap_or_else(|| path.to_string())
    }
}

/// Splits `[[Lfoo/Bar` into (`[[L`, `foo/Bar`); names without the wrapper
/// come back unchanged with an empty prefix.
fn split_type_wrapper(name: &str) -> (&str, &str) {
    let brackets = name.len() - name.trim_start_matches('[').len();
    match name[brackets..].strip_prefix('L') {
        Some(rest) if !rest.is_empty() => (&name[..=brackets], rest),
        _ => ("", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Vec<Relocator> {
        vec![
            Relocator::new("org.antlr", Some("com.acme.antlr")),
            Relocator::new("org.antlr.v4", Some("com.acme.antlr4")),
        ]
    }

    #[test]
    fn first_matching_relocator_wins() {
        let relocators = chain();
        let remapper = SymbolRemapper::new(&relocators);
        assert_eq!(
            remapper.map_class_or_path_name("org/antlr/v4/Tool").as_deref(),
            Some("com/acme/antlr/v4/Tool")
        );
    }

    #[test]
    fn unmatched_names_pass_through() {
        let relocators = chain();
        let remapper = SymbolRemapper::new(&relocators);
        assert_eq!(
            remapper.map_class_or_path_name("com/example/Main").as_deref(),
            Some("com/example/Main")
        );
        assert_eq!(remapper.map_embedded_string_value("hello"), "hello");
    }

    #[test]
    fn platform_names_are_never_mapped() {
        let relocators = vec![Relocator::new("java.lang", Some("evil.lang"))];
        let remapper = SymbolRemapper::new(&relocators);
        assert_eq!(remapper.map_class_or_path_name("java/lang/Object"), None);
        assert_eq!(remapper.map_class_or_path_name("javax/inject/Inject"), None);
        assert_eq!(remapper.map_class_or_path_name("jdk/internal/Misc"), None);
        assert_eq!(remapper.safe_map("java/lang/Object"), "java/lang/Object");
    }

    #[test]
    fn array_and_object_wrappers_are_preserved() {
        let relocators = vec![Relocator::new("org.antlr.v4", Some("com.acme.antlr4"))];
        let remapper = SymbolRemapper::new(&relocators);
        assert_eq!(
            remapper.map_class_or_path_name("[[Lorg/antlr/v4/Tool;").as_deref(),
            Some("[[Lcom/acme/antlr4/Tool;")
        );
        assert_eq!(
            remapper.map_embedded_string_value("Lorg/antlr/v4/Tool;"),
            "Lcom/acme/antlr4/Tool;"
        );
    }

    #[test]
    fn string_values_prefer_dotted_names() {
        let relocators = vec![Relocator::new("org.antlr.v4", Some("com.acme.antlr4"))];
        let remapper = SymbolRemapper::new(&relocators);
        assert_eq!(
            remapper.map_embedded_string_value("org.antlr.v4.Tool"),
            "com.acme.antlr4.Tool"
        );
        assert_eq!(
            remapper.map_embedded_string_value("org/antlr/v4/Tool"),
            "com/acme/antlr4/Tool"
        );
    }

    #[test]
    fn resource_paths_drop_the_extension() {
        let relocators = vec![Relocator::new("org.antlr.v4", Some("com.acme.antlr4"))];
        let remapper = SymbolRemapper::new(&relocators);
        assert_eq!(
            remapper.map_resource_path("org/antlr/v4/Lexer.class").as_deref(),
            Some("com/acme/antlr4/Lexer")
        );
        assert_eq!(
            remapper.map_resource_path("org/antlr/v4/NoExtension").as_deref(),
            Some("com/acme/antlr4/NoExtension")
        );
    }

    #[test]
    fn wrapper_split() {
        assert_eq!(split_type_wrapper("[[Lfoo"), ("[[L", "foo"));
        assert_eq!(split_type_wrapper("foo/Bar"), ("", "foo/Bar"));
        assert_eq!(split_type_wrapper("[I"), ("", "[I"));
        assert_eq!(split_type_wrapper("L"), ("", "L"));
    }
}
