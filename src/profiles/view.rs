use uuid::Uuid;

use crate::api::{Profile, Tweet};
use crate::cache::DehydratedState;
use crate::profiles::InfiniteFeed;
use crate::session::Session;

pub const SITE_TITLE: &str = "sharex.";

/// Cardinal plural category of a count. Only the English rules are needed:
/// "one" covers exactly 1, everything else (including 0 and 21) is "other".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluralCategory {
    One,
    Other,
}

pub fn plural_category(n: i64) -> PluralCategory {
    if n == 1 {
        PluralCategory::One
    } else {
        PluralCategory::Other
    }
}

/// Selects the word form matching a count's plural category.
pub fn get_plural<'a>(n: i64, singular: &'a str, plural: &'a str) -> &'a str {
    match plural_category(n) {
        PluralCategory::One => singular,
        PluralCategory::Other => plural,
    }
}

/// Escapes text for interpolation into HTML body or attribute positions.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const STYLE: &str = r#"
    body { margin: 0; font-family: system-ui, sans-serif; color: #111; }
    a { color: inherit; text-decoration: none; }
    .page-header { position: sticky; top: 0; display: flex; align-items: center;
      gap: 0.5rem; padding: 0.5rem 1rem; background: #fff; border-bottom: 1px solid #ddd; }
    .icon-hover { display: inline-flex; padding: 0.4rem; border-radius: 50%; }
    .icon-hover:hover { background: #eee; }
    .profile-image { width: 3rem; height: 3rem; border-radius: 50%; object-fit: cover; }
    .profile-image-placeholder { width: 3rem; height: 3rem; border-radius: 50%; background: #ccc; }
    .profile-title { flex-grow: 1; }
    .profile-title h1 { margin: 0; font-size: 1.1rem; }
    .profile-counts { color: #666; font-size: 0.9rem; }
    .btn { padding: 0.35rem 1rem; border: none; border-radius: 9999px;
      background: #1d9bf0; color: #fff; cursor: pointer; }
    .btn[disabled] { opacity: 0.5; cursor: default; }
    .btn.following { background: #657786; }
    .tweet-list { list-style: none; margin: 0; padding: 0; }
    .tweet { padding: 0.75rem 1rem; border-bottom: 1px solid #eee; }
    .tweet-author { font-weight: 600; margin-right: 0.5rem; }
    .tweet-time { color: #666; font-size: 0.85rem; }
    .tweet-content { margin: 0.25rem 0; white-space: pre-wrap; }
    .tweet-likes { color: #666; font-size: 0.85rem; }
    .feed-note { padding: 1rem; color: #666; }
    .feed-error { padding: 1rem; color: #b00020; }
    .load-more { margin: 1rem; }
    .not-found { padding: 3rem 1rem; text-align: center; }
"#;

const BOOTSTRAP_JS: &str = r#"
(function () {
  var stateTag = document.getElementById('__SHAREX_STATE__');
  window.__SHAREX_STATE__ = stateTag ? JSON.parse(stateTag.textContent) : { queries: [] };

  var followBtn = document.getElementById('follow-button');
  if (followBtn) {
    followBtn.addEventListener('click', function () {
      followBtn.disabled = true;
      fetch('/api/profile/' + followBtn.dataset.userId + '/follow', { method: 'POST' })
        .then(function (res) { return res.json(); })
        .then(function (body) {
          if (!body.success) return;
          var added = body.data.added_follow;
          followBtn.dataset.following = String(added);
          followBtn.textContent = added ? 'Unfollow' : 'Follow';
          followBtn.classList.toggle('following', added);
          var count = document.getElementById('follower-count');
          var label = document.getElementById('follower-label');
          if (count && label) {
            var n = parseInt(count.dataset.count, 10) + (added ? 1 : -1);
            count.dataset.count = String(n);
            count.textContent = String(n);
            label.textContent = n === 1 ? label.dataset.one : label.dataset.other;
          }
        })
        .finally(function () { followBtn.disabled = false; });
    });
  }

  var loadMore = document.getElementById('load-more');
  if (loadMore) {
    loadMore.addEventListener('click', function () {
      loadMore.disabled = true;
      var url = '/api/profile/' + loadMore.dataset.userId + '/feed?cursor='
        + encodeURIComponent(loadMore.dataset.cursor);
      fetch(url)
        .then(function (res) { return res.json(); })
        .then(function (body) {
          if (!body.success) return;
          var page = body.data;
          var list = document.getElementById('tweet-list');
          page.tweets.forEach(function (t) {
            var li = document.createElement('li');
            li.className = 'tweet';
            var author = document.createElement('span');
            author.className = 'tweet-author';
            author.textContent = t.author.name;
            var content = document.createElement('p');
            content.className = 'tweet-content';
            content.textContent = t.content;
            li.appendChild(author);
            li.appendChild(content);
            list.appendChild(li);
          });
          if (page.next_cursor) {
            loadMore.dataset.cursor = page.next_cursor;
          } else {
            loadMore.remove();
          }
        })
        .finally(function () { loadMore.disabled = false; });
    });
  }
})();
"#;

/// Document skeleton shared by every page.
fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape(title),
        STYLE,
        body
    )
}

pub fn home_page() -> String {
    document(
        SITE_TITLE,
        "<main class=\"feed-note\"><h1>sharex.</h1><p>Pick a profile to get started.</p></main>",
    )
}

pub fn not_found_page() -> String {
    document(
        &format!("404 | {}", SITE_TITLE),
        "<main class=\"not-found\"><h1>404</h1><p>This profile could not be found.</p></main>",
    )
}

fn profile_image(image: Option<&str>, name: &str) -> String {
    match image {
        Some(src) => format!(
            "<img class=\"profile-image\" src=\"{}\" alt=\"{}\">",
            escape(src),
            escape(name)
        ),
        None => "<div class=\"profile-image-placeholder\"></div>".to_string(),
    }
}

/// The follow control. Renders nothing for anonymous viewers and for one's
/// own profile. `is_loading` disables the control while a toggle request is
/// in flight; server-side renders always pass false and the bootstrap
/// script owns the flag afterwards.
pub fn follow_button(
    session: Option<&Session>,
    profile_id: Uuid,
    is_following: bool,
    is_loading: bool,
) -> String {
    let Some(session) = session else {
        return String::new();
    };
    if session.user_id == profile_id {
        return String::new();
    }

    let label = if is_following { "Unfollow" } else { "Follow" };
    let class = if is_following {
        "btn following"
    } else {
        "btn"
    };
    let disabled = if is_loading { " disabled" } else { "" };

    format!(
        "<button id=\"follow-button\" class=\"{}\" data-user-id=\"{}\" data-following=\"{}\"{}>{}</button>",
        class, profile_id, is_following, disabled, label
    )
}

fn counts_line(profile: &Profile) -> String {
    format!(
        "<div class=\"profile-counts\">\
         <span>{tweets} {tweet_word}</span> \u{b7} \
         <span><span id=\"follower-count\" data-count=\"{followers}\">{followers}</span> \
         <span id=\"follower-label\" data-one=\"follower\" data-other=\"followers\">{follower_word}</span></span> \u{b7} \
         <span>{follows} Following</span></div>",
        tweets = profile.tweets_count,
        tweet_word = get_plural(profile.tweets_count, "tweet", "tweets"),
        followers = profile.followers_count,
        follower_word = get_plural(profile.followers_count, "follower", "followers"),
        follows = profile.follows_count,
    )
}

fn profile_header(profile: &Profile, name: &str, session: Option<&Session>) -> String {
    format!(
        "<header class=\"page-header\">\
         <a class=\"icon-hover\" href=\"/\" aria-label=\"Back\">&#8592;</a>\
         {image}\
         <div class=\"profile-title\"><h1>{name}</h1>{counts}</div>\
         {follow}\
         </header>",
        image = profile_image(profile.image.as_deref(), name),
        name = escape(name),
        counts = counts_line(profile),
        follow = follow_button(session, profile.id, profile.is_following, false),
    )
}

fn tweet_item(tweet: &Tweet) -> String {
    format!(
        "<li class=\"tweet\">\
         <span class=\"tweet-author\">{author}</span>\
         <time class=\"tweet-time\" datetime=\"{datetime}\">{date}</time>\
         <p class=\"tweet-content\">{content}</p>\
         <span class=\"tweet-likes\">&#9825; {likes}</span>\
         </li>",
        author = escape(&tweet.author.name),
        datetime = tweet.created_at.to_rfc3339(),
        date = tweet.created_at.format("%b %e, %Y"),
        content = escape(&tweet.content),
        likes = tweet.like_count,
    )
}

/// The infinite list body: the flattened concatenation of every fetched
/// page's tweets, plus the list's own loading-failure and empty states.
fn tweet_list(feed: Option<&InfiniteFeed>, feed_error: bool, profile_id: Uuid) -> String {
    if feed_error {
        return "<p class=\"feed-error\">Error loading tweets. Try again later.</p>".to_string();
    }

    let Some(feed) = feed else {
        return "<p class=\"feed-note\">Loading\u{2026}</p>".to_string();
    };

    if feed.is_empty() {
        return "<p class=\"feed-note\">No tweets</p>".to_string();
    }

    let mut out = String::from("<ul id=\"tweet-list\" class=\"tweet-list\">");
    for tweet in feed.tweets() {
        out.push_str(&tweet_item(tweet));
    }
    out.push_str("</ul>");

    if let Some(cursor) = feed.next_cursor() {
        out.push_str(&format!(
            "<button id=\"load-more\" class=\"btn load-more\" data-user-id=\"{}\" data-cursor=\"{}\">Load more</button>",
            profile_id,
            escape(cursor)
        ));
    }

    out
}

/// Serialized cache entries for the hydrating client. `<` is escaped so a
/// value can never terminate the surrounding script tag.
fn dehydrated_state_tag(state: &DehydratedState) -> String {
    let json = serde_json::to_string(state)
        .unwrap_or_else(|_| "{\"queries\":[]}".to_string())
        .replace('<', "\\u003c");
    format!(
        "<script type=\"application/json\" id=\"__SHAREX_STATE__\">{}</script>",
        json
    )
}

pub fn profile_page(
    profile: &Profile,
    name: &str,
    feed: Option<&InfiniteFeed>,
    feed_error: bool,
    session: Option<&Session>,
    state: &DehydratedState,
) -> String {
    let body = format!(
        "{header}\n<main>\n{list}\n</main>\n{state}\n<script>{js}</script>",
        header = profile_header(profile, name, session),
        list = tweet_list(feed, feed_error, profile.id),
        state = dehydrated_state_tag(state),
        js = BOOTSTRAP_JS,
    );

    document(&format!("{} {}", SITE_TITLE, name), &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FeedPage, TweetAuthor};
    use crate::cache::QueryCache;
    use chrono::Utc;

    fn profile() -> Profile {
        Profile {
            id: Uuid::new_v4(),
            name: Some("casey".to_string()),
            image: None,
            tweets_count: 2,
            followers_count: 1,
            follows_count: 5,
            is_following: false,
        }
    }

    fn session_for(user_id: Uuid) -> Session {
        Session {
            user_id,
            token: "token".to_string(),
        }
    }

    fn feed_with(contents: &[&str], next_cursor: Option<&str>) -> InfiniteFeed {
        let mut feed = InfiniteFeed::default();
        feed.push_page(FeedPage {
            tweets: contents
                .iter()
                .map(|content| Tweet {
                    id: Uuid::new_v4(),
                    content: content.to_string(),
                    created_at: Utc::now(),
                    like_count: 3,
                    author: TweetAuthor {
                        id: Uuid::new_v4(),
                        name: "casey".to_string(),
                        image: None,
                    },
                })
                .collect(),
            next_cursor: next_cursor.map(ToString::to_string),
        });
        feed
    }

    #[test]
    fn plural_category_follows_english_cardinal_rules() {
        assert_eq!(get_plural(0, "tweet", "tweets"), "tweets");
        assert_eq!(get_plural(1, "tweet", "tweets"), "tweet");
        assert_eq!(get_plural(2, "tweet", "tweets"), "tweets");
        assert_eq!(get_plural(21, "tweet", "tweets"), "tweets");
    }

    #[test]
    fn follow_button_hidden_without_session() {
        assert_eq!(follow_button(None, Uuid::new_v4(), false, false), "");
    }

    #[test]
    fn follow_button_hidden_on_own_profile() {
        let id = Uuid::new_v4();
        let session = session_for(id);
        assert_eq!(follow_button(Some(&session), id, false, false), "");
    }

    #[test]
    fn follow_button_labels_follow_direction() {
        let session = session_for(Uuid::new_v4());
        let id = Uuid::new_v4();

        let not_following = follow_button(Some(&session), id, false, false);
        assert!(not_following.contains(">Follow<"));
        assert!(!not_following.contains("following\""));

        let following = follow_button(Some(&session), id, true, false);
        assert!(following.contains(">Unfollow<"));
        assert!(following.contains("btn following"));
    }

    #[test]
    fn follow_button_disabled_while_toggle_in_flight() {
        let session = session_for(Uuid::new_v4());
        let html = follow_button(Some(&session), Uuid::new_v4(), false, true);
        assert!(html.contains(" disabled>"));
    }

    #[test]
    fn escape_neutralizes_markup() {
        assert_eq!(
            escape("<script>\"a\" & 'b'</script>"),
            "&lt;script&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/script&gt;"
        );
    }

    #[tokio::test]
    async fn profile_page_renders_title_counts_and_tweets() {
        let profile = profile();
        let feed = feed_with(&["hello world"], Some("c1"));
        let state = QueryCache::new().dehydrate(&[]).await;

        let html = profile_page(&profile, "casey", Some(&feed), false, None, &state);

        assert!(html.contains("<title>sharex. casey</title>"));
        assert!(html.contains("2 tweets"));
        assert!(html.contains("data-count=\"1\""));
        assert!(html.contains(">follower</span>"));
        assert!(html.contains("5 Following"));
        assert!(html.contains("hello world"));
        assert!(html.contains("id=\"load-more\""));
        assert!(html.contains("data-cursor=\"c1\""));
        // anonymous viewer gets no follow control
        assert!(!html.contains("id=\"follow-button\""));
    }

    #[tokio::test]
    async fn profile_page_escapes_user_content() {
        let mut profile = profile();
        profile.name = Some("<casey>".to_string());
        let feed = feed_with(&["<img onerror=x>"], None);
        let state = QueryCache::new().dehydrate(&[]).await;

        let html = profile_page(&profile, "<casey>", Some(&feed), false, None, &state);

        assert!(!html.contains("<casey>"));
        assert!(html.contains("&lt;casey&gt;"));
        assert!(!html.contains("<img onerror"));
    }

    #[test]
    fn feed_error_renders_the_list_error_indicator() {
        let html = tweet_list(None, true, Uuid::new_v4());
        assert!(html.contains("feed-error"));
    }

    #[test]
    fn empty_feed_renders_empty_state() {
        let feed = feed_with(&[], None);
        let html = tweet_list(Some(&feed), false, Uuid::new_v4());
        assert!(html.contains("No tweets"));
        assert!(!html.contains("load-more"));
    }

    #[test]
    fn not_found_page_says_404() {
        let html = not_found_page();
        assert!(html.contains("404"));
        assert!(html.contains("could not be found"));
    }
}
