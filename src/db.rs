use crate::models::{Comment, Follow, Group, Post, User};
use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use std::{
    collections::HashSet,
    sync::atomic::{AtomicU64, Ordering},
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DbError {
    #[error("username {0:?} is already taken")]
    UsernameTaken(String),
    #[error("group slug {0:?} is already taken")]
    SlugTaken(String),
    #[error("{0} not found")]
    NotFound(&'static str),
}

pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub hashed_password: String,
}

pub struct NewGroup {
    pub title: String,
    pub slug: String,
    pub description: String,
}

pub struct NewPost {
    pub author_id: u64,
    pub group_id: Option<u64>,
    pub text: String,
    pub image: Option<String>,
}

pub struct NewComment {
    pub post_id: u64,
    pub author_id: u64,
    pub text: String,
}

/// Per-table id allocator. Ids start at 1 and follow insertion order.
#[derive(Default)]
struct Sequence(AtomicU64);

impl Sequence {
    fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// In-memory relational store.
///
/// Every table is a `DashMap`, so handlers can share one `Arc<Database>`
/// without extra locking. Unique keys (usernames, group slugs and follow
/// pairs) go through `entry`, which holds the shard lock between the
/// existence check and the insert.
#[derive(Default)]
pub struct Database {
    users: DashMap<u64, User>,
    username_index: DashMap<String, u64>,
    groups: DashMap<u64, Group>,
    slug_index: DashMap<String, u64>,
    posts: DashMap<u64, Post>,
    comments: DashMap<u64, Comment>,
    follows: DashMap<(u64, u64), Follow>,
    user_ids: Sequence,
    group_ids: Sequence,
    post_ids: Sequence,
    comment_ids: Sequence,
    follow_ids: Sequence,
}

/// Newest first; equal timestamps keep insertion (id) order.
fn sort_newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, u64)) {
    items.sort_by(|a, b| {
        let (created_a, id_a) = key(a);
        let (created_b, id_b) = key(b);
        created_b.cmp(&created_a).then(id_a.cmp(&id_b))
    });
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------ users

    pub fn create_user(&self, new: NewUser, created_at: DateTime<Utc>) -> Result<User, DbError> {
        match self.username_index.entry(new.username.clone()) {
            Entry::Occupied(_) => Err(DbError::UsernameTaken(new.username)),
            Entry::Vacant(slot) => {
                let user = User {
                    id: self.user_ids.next(),
                    username: new.username,
                    first_name: new.first_name,
                    last_name: new.last_name,
                    email: new.email,
                    hashed_password: new.hashed_password,
                    created_at,
                };
                self.users.insert(user.id, user.clone());
                slot.insert(user.id);
                Ok(user)
            }
        }
    }

    pub fn user(&self, id: u64) -> Option<User> {
        self.users.get(&id).map(|user| user.clone())
    }

    pub fn user_by_username(&self, username: &str) -> Option<User> {
        let id = *self.username_index.get(username)?;
        self.user(id)
    }

    /// Removes the user together with their posts (and those posts'
    /// comments), their own comments and every follow edge touching them.
    ///
    /// Inserts racing with this call re-check their references after
    /// writing and undo themselves, so the cascade leaves no orphans.
    pub fn delete_user(&self, id: u64) -> Result<(), DbError> {
        let (_, user) = self.users.remove(&id).ok_or(DbError::NotFound("user"))?;
        self.username_index.remove(&user.username);

        let mut removed_posts = HashSet::new();
        self.posts.retain(|post_id, post| {
            if post.author_id == id {
                removed_posts.insert(*post_id);
                false
            } else {
                true
            }
        });
        self.comments
            .retain(|_, comment| comment.author_id != id && !removed_posts.contains(&comment.post_id));
        self.follows
            .retain(|&(follower, author), _| follower != id && author != id);
        Ok(())
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    // ----------------------------------------------------------------- groups

    pub fn create_group(&self, new: NewGroup, created_at: DateTime<Utc>) -> Result<Group, DbError> {
        match self.slug_index.entry(new.slug.clone()) {
            Entry::Occupied(_) => Err(DbError::SlugTaken(new.slug)),
            Entry::Vacant(slot) => {
                let group = Group {
                    id: self.group_ids.next(),
                    title: new.title,
                    slug: new.slug,
                    description: new.description,
                    created_at,
                };
                self.groups.insert(group.id, group.clone());
                slot.insert(group.id);
                Ok(group)
            }
        }
    }

    pub fn group(&self, id: u64) -> Option<Group> {
        self.groups.get(&id).map(|group| group.clone())
    }

    pub fn group_by_slug(&self, slug: &str) -> Option<Group> {
        let id = *self.slug_index.get(slug)?;
        self.group(id)
    }

    /// All groups in creation order.
    pub fn groups(&self) -> Vec<Group> {
        let mut groups: Vec<Group> = self.groups.iter().map(|entry| entry.value().clone()).collect();
        groups.sort_by_key(|group| group.id);
        groups
    }

    /// Removes the group. Its posts survive with no group.
    pub fn delete_group(&self, id: u64) -> Result<(), DbError> {
        let (_, group) = self.groups.remove(&id).ok_or(DbError::NotFound("group"))?;
        self.slug_index.remove(&group.slug);
        for mut post in self.posts.iter_mut() {
            if post.group_id == Some(id) {
                post.group_id = None;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------ posts

    pub fn create_post(&self, new: NewPost, created_at: DateTime<Utc>) -> Result<Post, DbError> {
        if !self.users.contains_key(&new.author_id) {
            return Err(DbError::NotFound("user"));
        }
        if let Some(group_id) = new.group_id {
            if !self.groups.contains_key(&group_id) {
                return Err(DbError::NotFound("group"));
            }
        }

        let post = Post {
            id: self.post_ids.next(),
            author_id: new.author_id,
            group_id: new.group_id,
            text: new.text,
            image: new.image,
            created_at,
        };
        self.posts.insert(post.id, post.clone());

        let group_gone = post.group_id.is_some_and(|id| !self.groups.contains_key(&id));
        if !self.users.contains_key(&post.author_id) || group_gone {
            self.posts.remove(&post.id);
            return Err(DbError::NotFound(if group_gone { "group" } else { "user" }));
        }
        Ok(post)
    }

    pub fn post(&self, id: u64) -> Option<Post> {
        self.posts.get(&id).map(|post| post.clone())
    }

    /// Applies `change` to the stored post in place and returns the result.
    pub fn update_post(&self, id: u64, change: impl FnOnce(&mut Post)) -> Result<Post, DbError> {
        let mut post = self.posts.get_mut(&id).ok_or(DbError::NotFound("post"))?;
        change(post.value_mut());
        Ok(post.clone())
    }

    /// Removes the post and its comments.
    pub fn delete_post(&self, id: u64) -> Result<(), DbError> {
        self.posts.remove(&id).ok_or(DbError::NotFound("post"))?;
        self.comments.retain(|_, comment| comment.post_id != id);
        Ok(())
    }

    /// Posts accepted by `filter`, newest first.
    pub fn posts_where(&self, filter: impl Fn(&Post) -> bool) -> Vec<Post> {
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|entry| filter(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        sort_newest_first(&mut posts, |post| (post.created_at, post.id));
        posts
    }

    pub fn count_posts_by(&self, author_id: u64) -> usize {
        self.posts
            .iter()
            .filter(|entry| entry.author_id == author_id)
            .count()
    }

    pub fn post_count(&self) -> usize {
        self.posts.len()
    }

    // --------------------------------------------------------------- comments

    pub fn create_comment(&self, new: NewComment, created_at: DateTime<Utc>) -> Result<Comment, DbError> {
        if !self.posts.contains_key(&new.post_id) {
            return Err(DbError::NotFound("post"));
        }
        if !self.users.contains_key(&new.author_id) {
            return Err(DbError::NotFound("user"));
        }

        let comment = Comment {
            id: self.comment_ids.next(),
            post_id: new.post_id,
            author_id: new.author_id,
            text: new.text,
            created_at,
        };
        self.comments.insert(comment.id, comment.clone());

        let missing = if !self.posts.contains_key(&comment.post_id) {
            Some("post")
        } else if !self.users.contains_key(&comment.author_id) {
            Some("user")
        } else {
            None
        };
        if let Some(entity) = missing {
            self.comments.remove(&comment.id);
            return Err(DbError::NotFound(entity));
        }
        Ok(comment)
    }

    /// Comments on one post, newest first.
    pub fn comments_for_post(&self, post_id: u64) -> Vec<Comment> {
        let mut comments: Vec<Comment> = self
            .comments
            .iter()
            .filter(|entry| entry.post_id == post_id)
            .map(|entry| entry.value().clone())
            .collect();
        sort_newest_first(&mut comments, |comment| (comment.created_at, comment.id));
        comments
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }

    // ---------------------------------------------------------------- follows

    /// Adds the `user_id -> author_id` edge. Returns `false` when the edge
    /// already existed, in which case nothing is written.
    pub fn follow(&self, user_id: u64, author_id: u64) -> Result<bool, DbError> {
        if !self.users.contains_key(&user_id) || !self.users.contains_key(&author_id) {
            return Err(DbError::NotFound("user"));
        }

        let created = match self.follows.entry((user_id, author_id)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Follow {
                    id: self.follow_ids.next(),
                    user_id,
                    author_id,
                });
                true
            }
        };

        if !self.users.contains_key(&user_id) || !self.users.contains_key(&author_id) {
            self.follows.remove(&(user_id, author_id));
            return Err(DbError::NotFound("user"));
        }
        Ok(created)
    }

    /// Removes the edge if present. Returns whether anything was removed.
    pub fn unfollow(&self, user_id: u64, author_id: u64) -> bool {
        self.follows.remove(&(user_id, author_id)).is_some()
    }

    pub fn is_following(&self, user_id: u64, author_id: u64) -> bool {
        self.follows.contains_key(&(user_id, author_id))
    }

    /// Ids of every author `user_id` follows.
    pub fn followed_authors(&self, user_id: u64) -> HashSet<u64> {
        self.follows
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.author_id)
            .collect()
    }

    pub fn follow_count(&self) -> usize {
        self.follows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_user(db: &Database, username: &str) -> User {
        db.create_user(
            NewUser {
                username: username.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                email: format!("{username}@example.com"),
                hashed_password: String::new(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn new_group(db: &Database, slug: &str) -> Group {
        db.create_group(
            NewGroup {
                title: format!("Group {slug}"),
                slug: slug.to_string(),
                description: "description".to_string(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn new_post(db: &Database, author: &User, group: Option<&Group>, at: DateTime<Utc>) -> Post {
        db.create_post(
            NewPost {
                author_id: author.id,
                group_id: group.map(|g| g.id),
                text: "text".to_string(),
                image: None,
            },
            at,
        )
        .unwrap()
    }

    #[test]
    fn usernames_and_slugs_are_unique() {
        let db = Database::new();
        new_user(&db, "leo");
        let err = db
            .create_user(
                NewUser {
                    username: "leo".to_string(),
                    first_name: String::new(),
                    last_name: String::new(),
                    email: String::new(),
                    hashed_password: String::new(),
                },
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err, DbError::UsernameTaken("leo".to_string()));
        assert_eq!(db.user_count(), 1);

        new_group(&db, "cats");
        let err = db
            .create_group(
                NewGroup {
                    title: "Other".to_string(),
                    slug: "cats".to_string(),
                    description: String::new(),
                },
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err, DbError::SlugTaken("cats".to_string()));
    }

    #[test]
    fn ids_follow_insertion_order() {
        let db = Database::new();
        let first = new_user(&db, "first");
        let second = new_user(&db, "second");
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[test]
    fn posts_where_orders_newest_first_and_keeps_ties_stable() {
        let db = Database::new();
        let author = new_user(&db, "author");
        let base = Utc::now();
        let old = new_post(&db, &author, None, base - Duration::hours(1));
        let tie_a = new_post(&db, &author, None, base);
        let tie_b = new_post(&db, &author, None, base);
        let newest = new_post(&db, &author, None, base + Duration::hours(1));

        let ids: Vec<u64> = db.posts_where(|_| true).iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![newest.id, tie_a.id, tie_b.id, old.id]);
    }

    #[test]
    fn follow_is_idempotent_and_unfollow_is_a_noop_when_absent() {
        let db = Database::new();
        let reader = new_user(&db, "reader");
        let author = new_user(&db, "author");

        assert!(db.follow(reader.id, author.id).unwrap());
        assert!(!db.follow(reader.id, author.id).unwrap());
        assert_eq!(db.follow_count(), 1);
        assert!(db.is_following(reader.id, author.id));
        assert!(!db.is_following(author.id, reader.id));

        assert!(db.unfollow(reader.id, author.id));
        assert!(!db.unfollow(reader.id, author.id));
        assert_eq!(db.follow_count(), 0);
    }

    #[test]
    fn follow_requires_both_users() {
        let db = Database::new();
        let reader = new_user(&db, "reader");
        assert_eq!(db.follow(reader.id, 42), Err(DbError::NotFound("user")));
    }

    #[test]
    fn deleting_a_user_cascades() {
        let db = Database::new();
        let author = new_user(&db, "author");
        let reader = new_user(&db, "reader");
        let post = new_post(&db, &author, None, Utc::now());
        let other_post = new_post(&db, &reader, None, Utc::now());
        db.create_comment(
            NewComment {
                post_id: post.id,
                author_id: reader.id,
                text: "on author's post".to_string(),
            },
            Utc::now(),
        )
        .unwrap();
        db.create_comment(
            NewComment {
                post_id: other_post.id,
                author_id: author.id,
                text: "by author".to_string(),
            },
            Utc::now(),
        )
        .unwrap();
        db.follow(reader.id, author.id).unwrap();
        db.follow(author.id, reader.id).unwrap();

        db.delete_user(author.id).unwrap();

        assert!(db.user_by_username("author").is_none());
        assert!(db.post(post.id).is_none());
        assert!(db.post(other_post.id).is_some());
        assert_eq!(db.comment_count(), 0);
        assert_eq!(db.follow_count(), 0);
        assert_eq!(db.delete_user(author.id), Err(DbError::NotFound("user")));
    }

    #[test]
    fn deleting_a_group_keeps_its_posts() {
        let db = Database::new();
        let author = new_user(&db, "author");
        let group = new_group(&db, "cats");
        let post = new_post(&db, &author, Some(&group), Utc::now());

        db.delete_group(group.id).unwrap();

        assert!(db.group_by_slug("cats").is_none());
        assert_eq!(db.post(post.id).unwrap().group_id, None);
    }

    #[test]
    fn deleting_a_post_removes_its_comments() {
        let db = Database::new();
        let author = new_user(&db, "author");
        let post = new_post(&db, &author, None, Utc::now());
        db.create_comment(
            NewComment {
                post_id: post.id,
                author_id: author.id,
                text: "hi".to_string(),
            },
            Utc::now(),
        )
        .unwrap();

        db.delete_post(post.id).unwrap();

        assert_eq!(db.post_count(), 0);
        assert!(db.comments_for_post(post.id).is_empty());
    }

    #[test]
    fn comments_need_an_existing_post() {
        let db = Database::new();
        let author = new_user(&db, "author");
        let err = db
            .create_comment(
                NewComment {
                    post_id: 7,
                    author_id: author.id,
                    text: "hi".to_string(),
                },
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err, DbError::NotFound("post"));
    }

    #[test]
    fn writes_racing_an_author_delete_leave_no_orphans() {
        for _ in 0..20 {
            let db = Database::new();
            let author = new_user(&db, "author");
            let reader = new_user(&db, "reader");
            let target = new_post(&db, &reader, None, Utc::now());

            std::thread::scope(|scope| {
                scope.spawn(|| {
                    for _ in 0..200 {
                        let _ = db.create_post(
                            NewPost {
                                author_id: author.id,
                                group_id: None,
                                text: "racing".to_string(),
                                image: None,
                            },
                            Utc::now(),
                        );
                        let _ = db.create_comment(
                            NewComment {
                                post_id: target.id,
                                author_id: author.id,
                                text: "racing".to_string(),
                            },
                            Utc::now(),
                        );
                        let _ = db.follow(reader.id, author.id);
                    }
                });
                scope.spawn(|| {
                    std::thread::yield_now();
                    db.delete_user(author.id).unwrap();
                });
            });

            assert_eq!(db.count_posts_by(author.id), 0);
            assert_eq!(db.comment_count(), 0);
            assert_eq!(db.post_count(), 1);
            assert_eq!(db.follow_count(), 0);
        }
    }
}
