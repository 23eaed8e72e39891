use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;

use crate::parser::Question;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS questions (
            id         INTEGER PRIMARY KEY,
            position   INTEGER NOT NULL,
            page       INTEGER NOT NULL,
            section    TEXT NOT NULL,
            number     INTEGER NOT NULL,
            text       TEXT NOT NULL,
            answer     TEXT CHECK(answer IN ('A','B','C','D')),
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_questions_section ON questions(section);

        CREATE TABLE IF NOT EXISTS options (
            question_id INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
            key         TEXT NOT NULL CHECK(key IN ('A','B','C','D')),
            position    INTEGER NOT NULL,
            text        TEXT NOT NULL,
            image       TEXT,
            PRIMARY KEY (question_id, key)
        );

        CREATE TABLE IF NOT EXISTS question_images (
            question_id INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
            position    INTEGER NOT NULL,
            path        TEXT NOT NULL,
            PRIMARY KEY (question_id, position)
        );
        ",
    )?;
    Ok(())
}

/// Replace the stored document with `questions`, in one transaction.
pub fn save_questions(conn: &Connection, questions: &[Question]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch("DELETE FROM question_images; DELETE FROM options; DELETE FROM questions;")?;
    {
        let mut insert_q = tx.prepare(
            "INSERT INTO questions (position, page, section, number, text, answer)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        let mut insert_opt = tx.prepare(
            "INSERT INTO options (question_id, key, position, text, image)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        let mut insert_img = tx.prepare(
            "INSERT INTO question_images (question_id, position, path) VALUES (?1, ?2, ?3)",
        )?;

        for (pos, q) in questions.iter().enumerate() {
            let question_id = insert_q.insert(rusqlite::params![
                pos,
                q.page,
                q.section,
                q.question_number,
                q.question_text,
                q.answer.map(String::from),
            ])?;
            for (opt_pos, opt) in q.options.iter().enumerate() {
                insert_opt.execute(rusqlite::params![
                    question_id,
                    opt.key.to_string(),
                    opt_pos,
                    opt.text,
                    opt.image.as_ref().map(|img| img.to_string()),
                ])?;
            }
            for (img_pos, img) in q.question_images.iter().enumerate() {
                insert_img.execute(rusqlite::params![question_id, img_pos, img.to_string()])?;
            }
        }
    }
    tx.commit()?;
    Ok(())
}

pub struct Stats {
    pub total: usize,
    pub answered: usize,
    pub unanswered: usize,
    pub with_options: usize,
    pub with_images: usize,
    pub by_section: Vec<(String, usize)>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM questions", [], |r| r.get(0))?;
    let answered: usize = conn.query_row(
        "SELECT COUNT(*) FROM questions WHERE answer IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let with_options: usize = conn.query_row(
        "SELECT COUNT(DISTINCT question_id) FROM options",
        [],
        |r| r.get(0),
    )?;
    let with_images: usize = conn.query_row(
        "SELECT COUNT(*) FROM questions q
         WHERE EXISTS (SELECT 1 FROM question_images i WHERE i.question_id = q.id)
            OR EXISTS (SELECT 1 FROM options o WHERE o.question_id = q.id AND o.image IS NOT NULL)",
        [],
        |r| r.get(0),
    )?;

    let mut stmt = conn.prepare(
        "SELECT section, COUNT(*) FROM questions
         GROUP BY section ORDER BY MIN(position)",
    )?;
    let by_section = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, usize>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Stats {
        total,
        answered,
        unanswered: total - answered,
        with_options,
        with_images,
        by_section,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ImageRef;

    fn memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn sample() -> Vec<Question> {
        let mut q1 = Question::new(0, "MATH", 1, "What is 2+2?");
        q1.set_option('A', "3");
        q1.set_option('B', "4");
        q1.answer = Some('B');
        let mut q2 = Question::new(0, "MATH", 2, "Name the shape");
        q2.question_images.push(ImageRef::new("out/page0_img0.png"));
        q2.question_images.push(ImageRef::new("out/page0_img1.png"));
        let mut q3 = Question::new(1, "", 3, "Unsectioned");
        q3.set_option('C', "only");
        q3.options[0].image = Some(ImageRef::new("out/page1_img2.png"));
        vec![q1, q2, q3]
    }

    #[test]
    fn stats_after_save() {
        let conn = memory();
        save_questions(&conn, &sample()).unwrap();
        let s = get_stats(&conn).unwrap();
        assert_eq!(s.total, 3);
        assert_eq!(s.answered, 1);
        assert_eq!(s.unanswered, 2);
        assert_eq!(s.with_options, 2);
        assert_eq!(s.with_images, 2);
        assert_eq!(s.by_section, vec![("MATH".to_string(), 2), (String::new(), 1)]);
    }

    #[test]
    fn every_question_image_is_kept() {
        let conn = memory();
        save_questions(&conn, &sample()).unwrap();
        let n: usize = conn
            .query_row("SELECT COUNT(*) FROM question_images", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 2);
        let answer: Option<String> = conn
            .query_row("SELECT answer FROM questions WHERE number = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(answer.as_deref(), Some("B"));
    }

    #[test]
    fn save_replaces_previous_run() {
        let conn = memory();
        save_questions(&conn, &sample()).unwrap();
        save_questions(&conn, &sample()[..1]).unwrap();
        let s = get_stats(&conn).unwrap();
        assert_eq!(s.total, 1);
        let opts: usize = conn.query_row("SELECT COUNT(*) FROM options", [], |r| r.get(0)).unwrap();
        assert_eq!(opts, 2);
    }
}
