//! Query texts. Each block name is the key of its result in `data`.

pub const GROUPS_BY_USER: &str = r#"
query groups_by_user($name: string) {
    groups_by_user(func: type(User)) @filter(eq(name, $name)) {
        name
        ~HAS {
            name
        }
    }
}"#;

pub const MESSAGES_BETWEEN: &str = r#"
query messages_between($n: int, $from: int, $to: int) {
    messages_between(func: eq(phone, $from)) {
        SEND (first: $n) @cascade {
            content
            reactions
            sendAt
            RECEIVE @filter(eq(phone, $to)) {
                uid
            }
        }
    }
}"#;

pub const STATUSES_PAGE: &str = r#"
query statuses_page($first: int, $offset: int) {
    statuses_page(func: type(Status), orderasc: postedAt, first: $first, offset: $offset) {
        content
        text
        postedAt
        ~POST {
            name
        }
    }
}"#;

/// `count(uid)` at the root comes back as its own first element.
pub const USERS_OVERVIEW: &str = r#"
{
    users_overview(func: type(User), orderasc: name) {
        total: count(uid)
        name
        phone
        location
    }
}"#;

pub const SEARCH_MESSAGES: &str = r#"
query search_messages($terms: string) {
    search_messages(func: anyoftext(content, $terms), orderasc: sendAt) @filter(type(Message)) {
        content
        reactions
        sendAt
    }
}"#;

pub const STATUSES_THROUGH: &str = r#"
query statuses_through($date: string) {
    statuses_through(func: type(Status)) @filter(le(postedAt, $date)) {
        uid
        content
        postedAt
    }
}"#;
