//! Extension-based file filtering.

use std::collections::HashSet;

/// Case-insensitive extension filter over file URLs.
///
/// Extensions are normalized to a leading dot and lowercase at
/// construction; membership checks are O(1). An empty filter never
/// matches anything.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    extensions: HashSet<String>,
}

impl FileFilter {
    /// Builds a filter from extension strings; the leading dot is
    /// optional (`"pdf"` and `".pdf"` are equivalent).
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| {
                let ext = ext.as_ref().to_lowercase();
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                }
            })
            .collect();
        FileFilter { extensions }
    }

    /// Whether the URL's final path segment carries a filtered extension.
    pub fn should_filter(&self, file_url: &str) -> bool {
        if self.extensions.is_empty() {
            return false;
        }
        match extension_of(file_url) {
            Some(ext) => self.extensions.contains(&ext),
            None => false,
        }
    }

    /// The normalized extension set, for summary output.
    pub fn extensions(&self) -> Vec<String> {
        let mut list: Vec<String> = self.extensions.iter().cloned().collect();
        list.sort();
        list
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

/// Lowercased `.ext` of the URL's final path segment, if it has one.
fn extension_of(file_url: &str) -> Option<String> {
    let without_query = file_url
        .split(['?', '#'])
        .next()
        .unwrap_or(file_url);
    let segment = without_query.rsplit('/').next().unwrap_or(without_query);
    let dot = segment.rfind('.')?;
    if dot == 0 || dot + 1 == segment.len() {
        return None;
    }
    Some(segment[dot..].to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_with_and_without_leading_dot() {
        let filter = FileFilter::new([".pdf", "exe"]);
        assert!(filter.should_filter("http://a.test/doc.pdf"));
        assert!(filter.should_filter("http://a.test/setup.exe"));
        assert!(!filter.should_filter("http://a.test/readme.txt"));
    }

    #[test]
    fn test_case_insensitive() {
        let filter = FileFilter::new([".PDF"]);
        assert!(filter.should_filter("http://a.test/DOC.pdf"));
        assert!(filter.should_filter("http://a.test/doc.PDF"));
    }

    #[test]
    fn test_empty_filter_never_matches() {
        let filter = FileFilter::new(Vec::<String>::new());
        assert!(!filter.should_filter("http://a.test/doc.pdf"));
        assert!(filter.is_empty());
    }

    #[test]
    fn test_only_final_segment_counts() {
        let filter = FileFilter::new([".pdf"]);
        // The ".pdf" in a parent segment must not match.
        assert!(!filter.should_filter("http://a.test/docs.pdf/index.html"));
        assert!(filter.should_filter("http://a.test/docs/x.pdf"));
    }

    #[test]
    fn test_query_string_ignored() {
        let filter = FileFilter::new([".pdf"]);
        assert!(filter.should_filter("http://a.test/doc.pdf?download=1"));
        assert!(!filter.should_filter("http://a.test/page?name=doc.pdf"));
    }

    #[test]
    fn test_extensionless_url_never_matches() {
        let filter = FileFilter::new([".pdf"]);
        assert!(!filter.should_filter("http://a.test/download"));
        assert!(!filter.should_filter("http://a.test/dir/"));
    }

    #[test]
    fn test_extensions_listing_is_sorted() {
        let filter = FileFilter::new(["zip", ".exe", "Msi"]);
        assert_eq!(filter.extensions(), vec![".exe", ".msi", ".zip"]);
    }
}
