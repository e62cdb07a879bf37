//! Special-page classification: URLs that cannot be outlined.

use tracing::debug;

use outlinelens_shared::{SpecialPage, SpecialPageInfo};

/// The first table entry whose prefix matches `url`.
pub fn detect_special_page(url: &str, table: &[SpecialPage]) -> Option<SpecialPageInfo> {
    if url.is_empty() {
        return None;
    }
    let entry = table.iter().find(|page| url.starts_with(&page.url))?;
    debug!(url, page_type = %entry.page_type, "special page");
    Some(SpecialPageInfo {
        page_type: entry.page_type.clone(),
        message: entry.message.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use outlinelens_shared::default_special_pages;

    #[test]
    fn extensions_page_beats_generic_chrome_prefix() {
        let info = detect_special_page("chrome://extensions/", &default_special_pages()).unwrap();
        assert_eq!(info.page_type, "扩展管理页面");
        assert!(info.message.contains("不支持大纲检测"));
    }

    #[test]
    fn internal_schemes_are_special() {
        let table = default_special_pages();
        for (url, page_type) in [
            ("chrome://settings/", "Chrome内部页面"),
            ("about:blank", "浏览器内部页面"),
            ("file:///home/me/notes.html", "本地文件"),
            ("https://chromewebstore.google.com/detail/x", "Chrome商店页面"),
        ] {
            let info = detect_special_page(url, &table).unwrap();
            assert_eq!(info.page_type, page_type, "{url}");
        }
    }

    #[test]
    fn ordinary_pages_are_not_special() {
        let table = default_special_pages();
        assert_eq!(detect_special_page("https://example.com/post", &table), None);
        assert_eq!(detect_special_page("", &table), None);
    }

    #[test]
    fn custom_tables_are_honored() {
        let table = vec![SpecialPage {
            url: "https://intranet.example.com/".into(),
            page_type: "Intranet".into(),
            message: "Not outlined".into(),
        }];
        let info = detect_special_page("https://intranet.example.com/wiki", &table).unwrap();
        assert_eq!(info.page_type, "Intranet");
        assert_eq!(detect_special_page("chrome://extensions/", &table), None);
    }
}
