use crate::feed::FeedItem;

/// Maximum visible length of an image caption
pub const CAPTION_LIMIT: usize = 1024;
/// Maximum visible length of a text message
pub const TEXT_LIMIT: usize = 4096;

const LINK_LABEL: &str = "Read full article";
const ELLIPSIS: &str = "...";

/// How an item is framed for the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    ImageCaption,
    Text,
}

impl Framing {
    pub fn for_item(item: &FeedItem) -> Self {
        if item.image_url.is_some() {
            Framing::ImageCaption
        } else {
            Framing::Text
        }
    }

    pub fn limit(&self) -> usize {
        match self {
            Framing::ImageCaption => CAPTION_LIMIT,
            Framing::Text => TEXT_LIMIT,
        }
    }

    /// Descriptions are pre-trimmed well below the hard limit to keep posts readable
    fn description_limit(&self) -> usize {
        match self {
            Framing::ImageCaption => 200,
            Framing::Text => 300,
        }
    }
}

/// Render an item as an HTML-formatted message.
///
/// Layout is a bold title, the description, and a final link line. The link
/// line is never truncated; when the visible text exceeds the framing limit
/// the description is shortened first, then the title.
pub fn compose(item: &FeedItem, framing: Framing) -> String {
    let (title, description) = fit_parts(&item.title, item.description.as_deref(), framing);

    let mut message = format!("<b>{}</b>", escape_html(&title));
    if let Some(description) = description {
        message.push_str("\n\n");
        message.push_str(&escape_html(&description));
    }
    message.push_str(&format!(
        "\n\n<a href=\"{}\">{}</a>",
        escape_html(&item.link),
        LINK_LABEL
    ));

    message
}

/// Title and description trimmed so the visible message fits the framing limit
fn fit_parts(title: &str, description: Option<&str>, framing: Framing) -> (String, Option<String>) {
    let limit = framing.limit();
    let link_len = LINK_LABEL.chars().count();

    let title = title.trim();
    let description = description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| truncate_with_ellipsis(d, framing.description_limit()));

    let title_len = title.chars().count();
    let fixed = title_len + 2 + link_len;

    match description {
        Some(description) if fixed + 2 + description.chars().count() <= limit => {
            (title.to_string(), Some(description))
        }
        Some(description) if limit > fixed + 2 + ELLIPSIS.len() => {
            let budget = limit - fixed - 2;
            (title.to_string(), Some(truncate_with_ellipsis(&description, budget)))
        }
        _ if fixed <= limit => (title.to_string(), None),
        _ => {
            let budget = limit.saturating_sub(2 + link_len);
            (truncate_with_ellipsis(title, budget), None)
        }
    }
}

fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, description: Option<&str>, image: bool) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            link: "https://example.com/story?id=1&ref=rss".to_string(),
            source: "ESPN".to_string(),
            image_url: image.then(|| "https://example.com/a.jpg".to_string()),
            description: description.map(str::to_string),
        }
    }

    fn visible_len(title: &str, description: &Option<String>) -> usize {
        let desc = description.as_ref().map(|d| d.chars().count() + 2).unwrap_or(0);
        title.chars().count() + desc + 2 + LINK_LABEL.chars().count()
    }

    #[test]
    fn test_framing_follows_image_presence() {
        assert_eq!(Framing::for_item(&item("t", None, true)), Framing::ImageCaption);
        assert_eq!(Framing::for_item(&item("t", None, false)), Framing::Text);
    }

    #[test]
    fn test_compose_layout_and_escaping() {
        let message = compose(&item("England <3 Ashes", Some("Root & Stokes"), false), Framing::Text);

        assert_eq!(
            message,
            "<b>England &lt;3 Ashes</b>\n\nRoot &amp; Stokes\n\n\
             <a href=\"https://example.com/story?id=1&amp;ref=rss\">Read full article</a>"
        );
    }

    #[test]
    fn test_description_pretrim() {
        let long = "x".repeat(500);
        let (_, caption_desc) = fit_parts("Title", Some(&long), Framing::ImageCaption);
        let (_, text_desc) = fit_parts("Title", Some(&long), Framing::Text);

        let caption_desc = caption_desc.unwrap();
        assert_eq!(caption_desc.chars().count(), 200);
        assert!(caption_desc.ends_with("..."));
        assert_eq!(text_desc.unwrap().chars().count(), 300);
    }

    #[test]
    fn test_long_title_shrinks_description_then_title() {
        let title = "T".repeat(900);
        let (fitted_title, description) = fit_parts(&title, Some(&"d".repeat(150)), Framing::ImageCaption);
        assert_eq!(fitted_title.chars().count(), 900);
        let description = description.unwrap();
        assert!(description.ends_with("..."));
        assert_eq!(visible_len(&fitted_title, &Some(description)), CAPTION_LIMIT);

        let huge = "T".repeat(5000);
        let (fitted_title, description) = fit_parts(&huge, Some("short"), Framing::Text);
        assert!(description.is_none());
        assert!(fitted_title.ends_with("..."));
        assert_eq!(visible_len(&fitted_title, &None), TEXT_LIMIT);
    }

    #[test]
    fn test_link_is_always_last_line() {
        for framing in [Framing::ImageCaption, Framing::Text] {
            let message = compose(&item(&"T".repeat(6000), Some(&"d".repeat(6000)), true), framing);
            let last_line = message.lines().last().unwrap();
            assert!(last_line.starts_with("<a href="));
            assert!(last_line.ends_with(">Read full article</a>"));
        }
    }

    #[test]
    fn test_blank_description_is_dropped() {
        let message = compose(&item("Title", Some("   "), false), Framing::Text);
        assert_eq!(message.matches("\n\n").count(), 1);
    }
}
