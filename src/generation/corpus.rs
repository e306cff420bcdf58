//! The scripture corpus questions are drawn from.

use crate::dao::models::Testament;

/// One book of the canon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Book {
    pub name: &'static str,
    pub testament: Testament,
    pub chapters: u32,
    /// Verse number every chapter of the book reaches.
    pub verse_cap: u32,
}

impl Book {
    /// Citation in `Book chapter:verse` form.
    pub fn reference(&self, chapter: u32, verse: u32) -> String {
        format!("{} {}:{}", self.name, chapter, verse)
    }
}

const fn old(name: &'static str, chapters: u32, verse_cap: u32) -> Book {
    Book {
        name,
        testament: Testament::Old,
        chapters,
        verse_cap,
    }
}

const fn new(name: &'static str, chapters: u32, verse_cap: u32) -> Book {
    Book {
        name,
        testament: Testament::New,
        chapters,
        verse_cap,
    }
}

/// The 66 books in canonical order.
pub static BOOKS: [Book; 66] = [
    old("Genesis", 50, 10),
    old("Exodus", 40, 10),
    old("Leviticus", 27, 10),
    old("Numbers", 36, 10),
    old("Deuteronomy", 34, 10),
    old("Joshua", 24, 10),
    old("Judges", 21, 10),
    old("Ruth", 4, 10),
    old("1 Samuel", 31, 10),
    old("2 Samuel", 24, 10),
    old("1 Kings", 22, 10),
    old("2 Kings", 25, 10),
    old("1 Chronicles", 29, 10),
    old("2 Chronicles", 36, 10),
    old("Ezra", 10, 10),
    old("Nehemiah", 13, 10),
    old("Esther", 10, 3),
    old("Job", 42, 6),
    old("Psalms", 150, 2),
    old("Proverbs", 31, 10),
    old("Ecclesiastes", 12, 10),
    old("Song of Solomon", 8, 10),
    old("Isaiah", 66, 8),
    old("Jeremiah", 52, 5),
    old("Lamentations", 5, 10),
    old("Ezekiel", 48, 10),
    old("Daniel", 12, 10),
    old("Hosea", 14, 5),
    old("Joel", 3, 10),
    old("Amos", 9, 10),
    old("Obadiah", 1, 10),
    old("Jonah", 4, 10),
    old("Micah", 7, 10),
    old("Nahum", 3, 10),
    old("Habakkuk", 3, 10),
    old("Zephaniah", 3, 10),
    old("Haggai", 2, 10),
    old("Zechariah", 14, 10),
    old("Malachi", 4, 6),
    new("Matthew", 28, 10),
    new("Mark", 16, 10),
    new("Luke", 24, 10),
    new("John", 21, 10),
    new("Acts", 28, 10),
    new("Romans", 16, 10),
    new("1 Corinthians", 16, 10),
    new("2 Corinthians", 13, 10),
    new("Galatians", 6, 10),
    new("Ephesians", 6, 10),
    new("Philippians", 4, 10),
    new("Colossians", 4, 10),
    new("1 Thessalonians", 5, 10),
    new("2 Thessalonians", 3, 10),
    new("1 Timothy", 6, 10),
    new("2 Timothy", 4, 10),
    new("Titus", 3, 10),
    new("Philemon", 1, 10),
    new("Hebrews", 13, 10),
    new("James", 5, 10),
    new("1 Peter", 5, 10),
    new("2 Peter", 3, 10),
    new("1 John", 5, 10),
    new("2 John", 1, 10),
    new("3 John", 1, 10),
    new("Jude", 1, 10),
    new("Revelation", 22, 10),
];

/// Books of one testament, canonical order.
pub fn books_in(testament: Testament) -> impl Iterator<Item = &'static Book> {
    BOOKS.iter().filter(move |book| book.testament == testament)
}

pub fn find_book(name: &str) -> Option<&'static Book> {
    BOOKS.iter().find(|book| book.name.eq_ignore_ascii_case(name))
}

/// Book named by a `Book chapter:verse` citation.
pub fn book_of_reference(reference: &str) -> Option<&'static Book> {
    let (name, location) = reference.trim().rsplit_once(' ')?;
    location.contains(':').then_some(())?;
    find_book(name.trim())
}
