//! Statement text shared by every engine.
//!
//! Statements are written once with `?` placeholders and rendered per
//! dialect when a [`Store`](super::Store) is built.

use crate::db::dialect::{Dialect, InodeAllocation, Placeholders};

const GET_INODE: &str = "SELECT inode, uid, gid, mode, type, ctime, atime, mtime, name, size \
     FROM metadata WHERE inode = ?";
const INODE_EXISTS: &str = "SELECT inode FROM metadata WHERE inode = ?";
const UPDATE_INODE: &str = "UPDATE metadata \
     SET uid = ?, gid = ?, mode = ?, type = ?, ctime = ?, atime = ?, mtime = ?, name = ?, size = ? \
     WHERE inode = ?";
const INSERT_INODE: &str = "INSERT INTO metadata (uid, gid, mode, type, ctime, atime, mtime, name, size) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0)";
const DELETE_INODE: &str = "DELETE FROM metadata WHERE inode = ?";
const TOUCH_ATIME: &str = "UPDATE metadata SET atime = ? WHERE inode = ?";
const SET_SIZE: &str = "UPDATE metadata SET size = ?, mtime = ? WHERE inode = ?";

const CHILDREN: &str = "SELECT inode FROM parent WHERE pinode = ?";
const CHILD_BY_NAME: &str = "SELECT p.inode FROM parent p \
     JOIN metadata m ON m.inode = p.inode \
     WHERE p.pinode = ? AND m.name = ?";
const LINK: &str = "INSERT INTO parent (pinode, inode) VALUES (?, ?)";
const UNLINK: &str = "DELETE FROM parent WHERE pinode = ? AND inode = ?";
const CHILD_COUNT: &str = "SELECT COUNT(*) AS n FROM parent WHERE pinode = ?";

const READ_CONTENT: &str = "SELECT data FROM filedata WHERE inode = ?";
const INSERT_CONTENT: &str = "INSERT INTO filedata (inode, data) VALUES (?, ?)";
const CONTENT_EXISTS: &str = "SELECT inode FROM filedata WHERE inode = ?";
const WRITE_CONTENT: &str = "UPDATE filedata SET data = ? WHERE inode = ?";
const DELETE_CONTENT: &str = "DELETE FROM filedata WHERE inode = ?";

const COUNT_EDGES: &str = "SELECT COUNT(*) AS n FROM parent";
const COUNT_CONTENT: &str = "SELECT COUNT(*) AS n FROM filedata";

/// Every statement the stores issue, rendered for one dialect.
#[derive(Debug, Clone)]
pub struct Sql {
    pub allocation: InodeAllocation,

    pub get_inode: String,
    pub inode_exists: String,
    pub update_inode: String,
    pub insert_inode: String,
    pub delete_inode: String,
    pub touch_atime: String,
    pub set_size: String,

    pub children: String,
    pub child_by_name: String,
    pub link: String,
    pub unlink: String,
    pub child_count: String,

    pub read_content: String,
    pub content_exists: String,
    pub insert_content: String,
    pub write_content: String,
    pub delete_content: String,

    pub count_edges: String,
    pub count_content: String,
}

impl Sql {
    pub fn new(dialect: &dyn Dialect) -> Self {
        let style = dialect.placeholders();
        let r = |stmt: &str| render(stmt, style);

        let mut insert_inode = r(INSERT_INODE);
        if dialect.allocation() == InodeAllocation::Returning {
            insert_inode.push_str(" RETURNING inode");
        }

        Self {
            allocation: dialect.allocation(),
            get_inode: r(GET_INODE),
            inode_exists: r(INODE_EXISTS),
            update_inode: r(UPDATE_INODE),
            insert_inode,
            delete_inode: r(DELETE_INODE),
            touch_atime: r(TOUCH_ATIME),
            set_size: r(SET_SIZE),
            children: r(CHILDREN),
            child_by_name: r(CHILD_BY_NAME),
            link: r(LINK),
            unlink: r(UNLINK),
            child_count: r(CHILD_COUNT),
            read_content: r(READ_CONTENT),
            content_exists: r(CONTENT_EXISTS),
            insert_content: r(INSERT_CONTENT),
            write_content: r(WRITE_CONTENT),
            delete_content: r(DELETE_CONTENT),
            count_edges: r(COUNT_EDGES),
            count_content: r(COUNT_CONTENT),
        }
    }
}

/// Rewrite `?` placeholders into the dialect's style.
///
/// Statement text here never contains a literal `?`.
fn render(stmt: &str, style: Placeholders) -> String {
    match style {
        Placeholders::Question => stmt.to_string(),
        Placeholders::Dollar => {
            let mut out = String::with_capacity(stmt.len() + 8);
            let mut n = 0;
            for c in stmt.chars() {
                if c == '?' {
                    n += 1;
                    out.push('$');
                    out.push_str(&n.to_string());
                } else {
                    out.push(c);
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DialectKind;

    #[test]
    fn test_render_dollar() {
        assert_eq!(
            render("DELETE FROM parent WHERE pinode = ? AND inode = ?", Placeholders::Dollar),
            "DELETE FROM parent WHERE pinode = $1 AND inode = $2"
        );
        assert_eq!(render(UNLINK, Placeholders::Question), UNLINK);
    }

    #[test]
    fn test_postgres_insert_returns_inode() {
        let sql = Sql::new(DialectKind::Postgres.dialect());
        assert!(sql.insert_inode.ends_with("RETURNING inode"));
        assert!(sql.insert_inode.contains("$8"));
        assert!(!sql.insert_inode.contains('?'));
        assert!(sql.update_inode.ends_with("WHERE inode = $10"));
    }

    #[test]
    fn test_sqlite_insert_returns_inode() {
        let sql = Sql::new(DialectKind::Sqlite.dialect());
        assert_eq!(sql.allocation, InodeAllocation::Returning);
        assert_eq!(sql.insert_inode, format!("{INSERT_INODE} RETURNING inode"));
        assert_eq!(sql.child_by_name, CHILD_BY_NAME);
    }

    #[test]
    fn test_mysql_uses_last_insert_id() {
        let sql = Sql::new(DialectKind::MySql.dialect());
        assert_eq!(sql.allocation, InodeAllocation::LastInsertId);
        assert_eq!(sql.insert_inode, INSERT_INODE);
        assert_eq!(sql.update_inode, UPDATE_INODE);
    }
}
