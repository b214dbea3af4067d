//! Page-number pagination over ordered result sets.
//!
//! Pages are 1-based. Requested numbers come straight from the query string,
//! so resolution never fails: absent or unparsable input selects the first
//! page, while numbers below one or past the end select the last page. An
//! empty set still has exactly one (empty) page.

use std::num::NonZeroU32;

use serde::Serialize;
use url::form_urlencoded;

/// Query parameter carrying the requested page number.
pub const PAGE_PARAM: &str = "page";

/// A resolved page within an ordered set of `total` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    number: u64,
    num_pages: u64,
    total: u64,
    per_page: u64,
}

impl PageWindow {
    pub fn resolve(total: u64, per_page: NonZeroU32, requested: Option<&str>) -> Self {
        let per_page = u64::from(per_page.get());
        let num_pages = total.div_ceil(per_page).max(1);
        let number = match parse_page_number(requested) {
            PageRequest::First => 1,
            PageRequest::Last => num_pages,
            PageRequest::Number(number) => number.min(num_pages),
        };

        Self {
            number,
            num_pages,
            total,
            per_page,
        }
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn num_pages(&self) -> u64 {
        self.num_pages
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    /// Number of items to skip before this page starts.
    pub fn offset(&self) -> u64 {
        (self.number - 1) * self.per_page
    }

    /// Number of items on this page (the last page may be short).
    pub fn len(&self) -> u64 {
        self.total
            .saturating_sub(self.offset())
            .min(self.per_page)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn next_number(&self) -> Option<u64> {
        self.has_next().then_some(self.number + 1)
    }

    pub fn previous_number(&self) -> Option<u64> {
        self.has_previous().then_some(self.number - 1)
    }

    /// 1-based index of the first item on the page, 0 when the set is empty.
    pub fn start_index(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            self.offset() + 1
        }
    }
}

/// Items of one page together with its window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub window: PageWindow,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow) -> Self {
        Self { items, window }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            window: self.window,
        }
    }
}

/// Page selected by a raw `page` query value, before clamping to the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    First,
    Last,
    Number(u64),
}

/// Interpret a raw `page` query value.
///
/// Anything that is not an integer selects the first page. Integers outside
/// the valid range (zero, negatives, or too large to represent) select the
/// last page.
pub fn parse_page_number(raw: Option<&str>) -> PageRequest {
    let Some(value) = raw.map(str::trim) else {
        return PageRequest::First;
    };

    match value.parse::<i64>() {
        Ok(number) if number >= 1 => u64::try_from(number)
            .map(PageRequest::Number)
            .unwrap_or(PageRequest::Last),
        Ok(_) => PageRequest::Last,
        Err(_) if is_integer_literal(value) => PageRequest::Last,
        Err(_) => PageRequest::First,
    }
}

fn is_integer_literal(value: &str) -> bool {
    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
}

/// Paginate an in-memory ordered slice.
pub fn paginate_slice<T: Clone>(
    items: &[T],
    per_page: NonZeroU32,
    requested: Option<&str>,
) -> Page<T> {
    let window = PageWindow::resolve(items.len() as u64, per_page, requested);
    let start = usize::try_from(window.offset()).unwrap_or(usize::MAX);
    let len = usize::try_from(window.len()).unwrap_or(0);
    let slice = items.iter().skip(start).take(len).cloned().collect();
    Page::new(slice, window)
}

/// Build a link to `page` that keeps the path and every other query pair.
pub fn page_link(path: &str, query: Option<&str>, page: u64) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    if let Some(query) = query {
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            if key != PAGE_PARAM {
                serializer.append_pair(&key, &value);
            }
        }
    }
    serializer.append_pair(PAGE_PARAM, &page.to_string());
    format!("{path}?{}", serializer.finish())
}

/// Extract the raw `page` value from a query string.
pub fn requested_page(query: Option<&str>) -> Option<String> {
    let query = query?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == PAGE_PARAM)
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).expect("non-zero page size")
    }

    #[test]
    fn fourteen_items_split_into_ten_and_four() {
        let items: Vec<u32> = (0..14).collect();

        let first = paginate_slice(&items, size(10), None);
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.window.num_pages(), 2);
        assert!(first.window.has_next());
        assert!(!first.window.has_previous());

        let second = paginate_slice(&items, size(10), Some("2"));
        assert_eq!(second.items.len(), 4);
        assert_eq!(second.items, (10..14).collect::<Vec<_>>());
        assert!(!second.window.has_next());
        assert_eq!(second.window.previous_number(), Some(1));
    }

    #[test]
    fn pages_reconstruct_sequence_exactly_once() {
        for len in [0_usize, 1, 9, 10, 11, 37] {
            for per_page in [1_u32, 3, 10] {
                let items: Vec<usize> = (0..len).collect();
                let first = paginate_slice(&items, size(per_page), None);
                let num_pages = first.window.num_pages();
                assert_eq!(num_pages, (len as u64).div_ceil(u64::from(per_page)).max(1));

                let mut rebuilt = Vec::new();
                for number in 1..=num_pages {
                    let page = paginate_slice(&items, size(per_page), Some(&number.to_string()));
                    assert_eq!(page.window.number(), number);
                    rebuilt.extend(page.items);
                }
                assert_eq!(rebuilt, items, "len={len} per_page={per_page}");
            }
        }
    }

    #[test]
    fn non_numeric_page_falls_back_to_first_page() {
        for raw in [None, Some(""), Some("abc"), Some("1.5"), Some("-")] {
            assert_eq!(parse_page_number(raw), PageRequest::First, "{raw:?}");
        }
        let window = PageWindow::resolve(14, size(10), Some("abc"));
        assert_eq!(window.number(), 1);
    }

    #[test]
    fn page_below_one_selects_last_page() {
        for raw in ["0", "-4", " -1 ", "99999999999999999999999"] {
            assert_eq!(parse_page_number(Some(raw)), PageRequest::Last, "{raw}");
            let window = PageWindow::resolve(14, size(10), Some(raw));
            assert_eq!(window.number(), 2, "{raw}");
            assert_eq!(window.len(), 4, "{raw}");
        }
        assert_eq!(parse_page_number(Some("+3")), PageRequest::Number(3));
    }

    #[test]
    fn page_past_the_end_clamps_to_last() {
        let window = PageWindow::resolve(14, size(10), Some("99"));
        assert_eq!(window.number(), 2);
        assert_eq!(window.offset(), 10);
        assert_eq!(window.len(), 4);
    }

    #[test]
    fn empty_set_has_one_empty_page() {
        let window = PageWindow::resolve(0, size(10), Some("3"));
        assert_eq!(window.number(), 1);
        assert_eq!(window.num_pages(), 1);
        assert!(window.is_empty());
        assert_eq!(window.start_index(), 0);
        assert!(!window.has_next());
        assert!(!window.has_previous());
    }

    #[test]
    fn page_link_replaces_only_page_param() {
        assert_eq!(page_link("/", None, 2), "/?page=2");
        assert_eq!(
            page_link("/group/cats/", Some("page=1&sort=new"), 3),
            "/group/cats/?sort=new&page=3"
        );
    }

    #[test]
    fn requested_page_reads_query_value() {
        assert_eq!(requested_page(Some("a=1&page=7")).as_deref(), Some("7"));
        assert_eq!(requested_page(Some("a=1")), None);
        assert_eq!(requested_page(None), None);
    }
}
