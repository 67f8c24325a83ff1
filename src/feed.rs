use crate::{
    db::Database,
    errors::ApiError,
    models::{Group, Post, User},
    pagination::{Page, Paginator},
};

/// Which posts belong to a feed.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    All,
    Group(&'a str),
    Author(&'a str),
    /// Posts by everyone the given user follows.
    Followed(u64),
}

/// A resolved feed: the requested page plus the entity the scope named.
#[derive(Debug)]
pub struct Feed {
    pub page: Page<Post>,
    pub group: Option<Group>,
    pub author: Option<User>,
}

/// Selects, orders and paginates posts for `scope`.
///
/// Unknown group slugs and usernames are `ApiError::NotFound`.
pub fn assemble(
    db: &Database,
    scope: Scope<'_>,
    page: Option<&str>,
    per_page: usize,
) -> Result<Feed, ApiError> {
    let mut group = None;
    let mut author = None;

    let posts = match scope {
        Scope::All => db.posts_where(|_| true),
        Scope::Group(slug) => {
            let found = db.group_by_slug(slug).ok_or(ApiError::NotFound)?;
            let group_id = found.id;
            group = Some(found);
            db.posts_where(|post| post.group_id == Some(group_id))
        }
        Scope::Author(username) => {
            let found = db.user_by_username(username).ok_or(ApiError::NotFound)?;
            let author_id = found.id;
            author = Some(found);
            db.posts_where(|post| post.author_id == author_id)
        }
        Scope::Followed(user_id) => {
            let followed = db.followed_authors(user_id);
            db.posts_where(|post| followed.contains(&post.author_id))
        }
    };

    Ok(Feed {
        page: Paginator::new(posts, per_page).get_page(page),
        group,
        author,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewGroup, NewPost, NewUser};
    use chrono::{Duration, Utc};

    const PER_PAGE: usize = 10;

    struct Fixture {
        db: Database,
        author: User,
        other: User,
        reader: User,
    }

    fn user(db: &Database, username: &str) -> User {
        db.create_user(
            NewUser {
                username: username.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                email: String::new(),
                hashed_password: String::new(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn group(db: &Database, slug: &str) -> Group {
        db.create_group(
            NewGroup {
                title: slug.to_string(),
                slug: slug.to_string(),
                description: String::new(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    /// `author` writes PER_PAGE + 3 posts in `cats`, `other` writes one in `dogs`.
    fn fixture() -> Fixture {
        let db = Database::new();
        let author = user(&db, "author");
        let other = user(&db, "other");
        let reader = user(&db, "reader");
        let cats = group(&db, "cats");
        let dogs = group(&db, "dogs");

        let start = Utc::now() - Duration::days(1);
        for n in 0..PER_PAGE + 3 {
            db.create_post(
                NewPost {
                    author_id: author.id,
                    group_id: Some(cats.id),
                    text: format!("post {n}"),
                    image: None,
                },
                start + Duration::minutes(n as i64),
            )
            .unwrap();
        }
        db.create_post(
            NewPost {
                author_id: other.id,
                group_id: Some(dogs.id),
                text: "other post".to_string(),
                image: None,
            },
            Utc::now(),
        )
        .unwrap();

        Fixture {
            db,
            author,
            other,
            reader,
        }
    }

    fn is_newest_first(posts: &[Post]) -> bool {
        posts.windows(2).all(|pair| pair[0].created_at >= pair[1].created_at)
    }

    #[test]
    fn every_scope_is_sorted_newest_first() {
        let f = fixture();
        f.db.follow(f.reader.id, f.author.id).unwrap();
        for scope in [
            Scope::All,
            Scope::Group("cats"),
            Scope::Author("author"),
            Scope::Followed(f.reader.id),
        ] {
            let feed = assemble(&f.db, scope, None, 100).unwrap();
            assert!(is_newest_first(&feed.page.items), "{scope:?}");
        }
    }

    #[test]
    fn author_feed_paginates_size_then_remainder() {
        let f = fixture();
        let first = assemble(&f.db, Scope::Author("author"), Some("1"), PER_PAGE).unwrap();
        let second = assemble(&f.db, Scope::Author("author"), Some("2"), PER_PAGE).unwrap();
        assert_eq!(first.page.items.len(), PER_PAGE);
        assert_eq!(second.page.items.len(), 3);
        assert_eq!(second.page.items.last().unwrap().text, "post 0");
        assert_eq!(first.author.unwrap().id, f.author.id);
    }

    #[test]
    fn index_counts_every_post() {
        let f = fixture();
        let second = assemble(&f.db, Scope::All, Some("2"), PER_PAGE).unwrap();
        assert_eq!(second.page.count, PER_PAGE + 4);
        assert_eq!(second.page.items.len(), 4);
    }

    #[test]
    fn group_feed_only_holds_its_own_posts() {
        let f = fixture();
        let cats = assemble(&f.db, Scope::Group("cats"), None, 100).unwrap();
        assert!(cats.page.items.iter().all(|post| post.author_id == f.author.id));
        assert_eq!(cats.group.unwrap().slug, "cats");

        let dogs = assemble(&f.db, Scope::Group("dogs"), None, 100).unwrap();
        assert_eq!(dogs.page.items.len(), 1);
        assert_eq!(dogs.page.items[0].author_id, f.other.id);
    }

    #[test]
    fn unknown_slug_or_username_is_not_found() {
        let f = fixture();
        assert!(matches!(
            assemble(&f.db, Scope::Group("nope"), None, PER_PAGE),
            Err(ApiError::NotFound)
        ));
        assert!(matches!(
            assemble(&f.db, Scope::Author("nobody"), None, PER_PAGE),
            Err(ApiError::NotFound)
        ));
    }

    #[test]
    fn followed_feed_tracks_follow_edges() {
        let f = fixture();
        let empty = assemble(&f.db, Scope::Followed(f.reader.id), None, PER_PAGE).unwrap();
        assert!(empty.page.items.is_empty());

        f.db.follow(f.reader.id, f.other.id).unwrap();
        let feed = assemble(&f.db, Scope::Followed(f.reader.id), None, PER_PAGE).unwrap();
        assert_eq!(feed.page.items.len(), 1);
        assert_eq!(feed.page.items[0].text, "other post");

        f.db.unfollow(f.reader.id, f.other.id);
        let feed = assemble(&f.db, Scope::Followed(f.reader.id), None, PER_PAGE).unwrap();
        assert!(feed.page.items.is_empty());
    }
}
