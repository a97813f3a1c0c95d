//! Backlink verification and excerpt extraction.
//!
//! Given the untrusted HTML of a source page and the set of URL variants for
//! the local content, [`extract`] decides whether the page genuinely links
//! back and, if so, pulls out a title and a short excerpt around the link.
//!
//! Parsing is lenient (`scraper`/html5ever never fails on malformed markup),
//! so hostile input can only ever produce [`Extraction::NotFound`].

mod excerpt;

use std::collections::HashSet;
use std::ops::Range;
use std::sync::LazyLock;

use linkback_shared::ExcerptOptions;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};

pub use excerpt::{excerpt_around, search_excerpt};

/// Elements whose text is the context of an inline link.
const PARAGRAPH_TAGS: &[&str] = &["p", "li", "dd", "blockquote", "figcaption"];

/// Elements whose text never renders.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template"];

static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static ANCHOR_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

/// Outcome of searching a source page for a backlink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// A backlink exists. `excerpt` is empty when the link sits outside any
    /// paragraph-like block.
    Found { title: String, excerpt: String },
    /// No anchor points at any variant.
    NotFound,
}

impl Extraction {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// Search `html` for an anchor whose `href` is exactly one of `variants`.
///
/// The title is the first `<title>` element's text, or `fallback_title`
/// (normally the source URL) when the page has none.
pub fn extract<S: AsRef<str>>(
    html: &str,
    variants: &[S],
    fallback_title: &str,
    opts: &ExcerptOptions,
) -> Extraction {
    let doc = Html::parse_document(html);
    let wanted: HashSet<&str> = variants.iter().map(AsRef::as_ref).collect();

    let Some(anchor) = find_backlink(&doc, &wanted) else {
        debug!(variants = wanted.len(), "no backlink found");
        return Extraction::NotFound;
    };

    let title = page_title(&doc).unwrap_or_else(|| fallback_title.to_string());
    let excerpt = match enclosing_block(anchor) {
        Some(block) => {
            let (context, span) = collect_text(block, Some(anchor));
            match span {
                Some(span) => excerpt_around(&context, span, opts),
                // Anchor sits inside hidden markup; fall back to its text.
                None => search_excerpt(&visible_text(anchor), &context, opts),
            }
        }
        None => {
            trace!("backlink has no enclosing paragraph");
            String::new()
        }
    };

    Extraction::Found { title, excerpt }
}

/// Whitespace-collapsed text of the first `<title>`, if non-empty.
pub fn page_title(doc: &Html) -> Option<String> {
    doc.select(&TITLE_SEL)
        .next()
        .map(|el| excerpt::collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

/// First anchor, in document order, whose `href` is wanted.
fn find_backlink<'a>(doc: &'a Html, wanted: &HashSet<&str>) -> Option<ElementRef<'a>> {
    doc.select(&ANCHOR_SEL).find(|a| {
        a.value()
            .attr("href")
            .is_some_and(|href| wanted.contains(href))
    })
}

/// Nearest paragraph-like ancestor of `el`.
fn enclosing_block(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| PARAGRAPH_TAGS.contains(&ancestor.value().name()))
}

/// Rendered text of `el`, skipping script-like children.
fn visible_text(el: ElementRef<'_>) -> String {
    collect_text(el, None).0
}

/// Whitespace-collapsed rendered text of `el`, plus the byte span that the
/// `mark` element's text occupies in it.
fn collect_text<'a>(
    el: ElementRef<'a>,
    mark: Option<ElementRef<'a>>,
) -> (String, Option<Range<usize>>) {
    let mut buf = TextBuf::default();
    push_text(el, mark, &mut buf);
    (buf.text, buf.span)
}

/// Collapses whitespace runs as text is appended, so offsets taken during
/// the walk stay valid in the final string.
#[derive(Default)]
struct TextBuf {
    text: String,
    pending_space: bool,
    span: Option<Range<usize>>,
}

impl TextBuf {
    fn push_str(&mut self, s: &str) {
        for c in s.chars() {
            if c.is_whitespace() {
                self.pending_space = !self.text.is_empty();
            } else {
                if self.pending_space {
                    self.text.push(' ');
                    self.pending_space = false;
                }
                self.text.push(c);
            }
        }
    }

    /// Offset at which the next visible character will land.
    fn next_offset(&self) -> usize {
        self.text.len() + usize::from(self.pending_space)
    }
}

fn push_text<'a>(el: ElementRef<'a>, mark: Option<ElementRef<'a>>, buf: &mut TextBuf) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            buf.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            let name = child_el.value().name();
            if name == "br" {
                buf.push_str(" ");
            } else if HIDDEN_TAGS.contains(&name) {
                continue;
            } else if buf.span.is_none() && mark == Some(child_el) {
                let start = buf.next_offset();
                push_text(child_el, mark, buf);
                let end = buf.text.len();
                buf.span = Some(start.min(end)..end);
            } else {
                push_text(child_el, mark, buf);
            }
        }
    }
}
