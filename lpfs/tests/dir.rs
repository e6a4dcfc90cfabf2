mod common;

use common::{dir, dirent, file, Fixture};
use lpfs::{
    layout::{DirEntry, DIRENT_SIZE, DIRENTS_PER_BLOCK},
    DirCursor, FsError, InodeKind,
};

/// root (ino 1) holds [(11, "a"), free, (12, "b")]
fn small_dir() -> Fixture {
    let mut fx = Fixture::new(16);
    fx.put_records(2, &[dir(1, 3 * DIRENT_SIZE as u64, &[4])]);
    fx.put_records(3, &[file(11, 1, &[8]), file(12, 2, &[9])]);
    fx.put_dirents(4, 0, &[dirent("a", 11), DirEntry::empty(), dirent("b", 12)]);
    fx
}

fn collect(fs: &lpfs::Lpfs, cursor: DirCursor) -> Vec<(String, u64)> {
    let root = fs.stat(1).unwrap();
    fs.dir_entries(&root, cursor)
        .map(|e| e.map(|e| (e.name_lossy().into_owned(), e.inode_number)))
        .collect::<Result<_, _>>()
        .unwrap()
}

#[test]
fn skips_free_slots() {
    let fs = small_dir().mount();
    assert_eq!(
        collect(&fs, DirCursor::new()),
        [("a".to_owned(), 11), ("b".to_owned(), 12)]
    );
}

#[test]
fn resolves_names() {
    let fs = small_dir().mount();
    let root = fs.stat(1).unwrap();
    let b = fs.lookup(&root, b"b").unwrap();
    assert_eq!(b.ino(), 12);
    assert_eq!(b.attr().unwrap().size, 2);
    assert_eq!(fs.lookup(&root, b"z").unwrap_err(), FsError::NotFound);
    assert_eq!(fs.lookup(&root, &[b'x'; 80]).unwrap_err(), FsError::NotFound);
    // names are compared byte for byte
    assert_eq!(fs.lookup(&root, b"B").unwrap_err(), FsError::NotFound);
}

#[test]
fn refused_entry_stays_unconsumed() {
    let fs = small_dir().mount();
    let root = fs.stat(1).unwrap();

    let mut cursor = DirCursor::new();
    fs.read_dir(&root, &mut cursor, |_| false).unwrap();
    assert_eq!(cursor.pos(), 0);

    let mut seen = Vec::new();
    fs.read_dir(&root, &mut cursor, |e| {
        if seen.is_empty() {
            seen.push(e.inode_number);
            true
        } else {
            false
        }
    })
    .unwrap();
    assert_eq!(seen, [11]);
    assert_eq!(cursor.pos(), 2 * DIRENT_SIZE as u64);

    assert_eq!(collect(&fs, cursor), [("b".to_owned(), 12)]);
}

#[test]
fn cursor_past_the_end_ends_listing() {
    let fs = small_dir().mount();
    let root = fs.stat(1).unwrap();
    for pos in [3 * DIRENT_SIZE as u64, 1 << 40, u64::MAX] {
        let mut cursor = DirCursor::at(pos);
        let mut seen = 0;
        fs.read_dir(&root, &mut cursor, |_| {
            seen += 1;
            true
        })
        .unwrap();
        assert_eq!(seen, 0);
        assert_eq!(cursor, DirCursor::at(pos));
        assert!(collect(&fs, cursor).is_empty());
    }
}

#[test]
fn iterator_reports_resume_position() {
    let fs = small_dir().mount();
    let root = fs.stat(1).unwrap();
    let mut entries = fs.dir_entries(&root, DirCursor::new());
    assert_eq!(entries.next().unwrap().unwrap().inode_number, 11);
    let resume = entries.position();
    drop(entries);
    assert_eq!(collect(&fs, resume), [("b".to_owned(), 12)]);
    assert_eq!(collect(&fs, DirCursor::at(resume.pos() + 5)), [("b".to_owned(), 12)]);
}

#[test]
fn spans_blocks_and_ignores_partial_tail() {
    let mut fx = Fixture::new(16);
    let total = DIRENTS_PER_BLOCK + 6;
    // trailing bytes that do not make a whole slot
    let size = (total * DIRENT_SIZE + 10) as u64;
    fx.put_records(2, &[dir(1, size, &[4, 5])]);
    let names: Vec<String> = (0..total).map(|i| format!("f{i}")).collect();
    let entries: Vec<_> = names
        .iter()
        .enumerate()
        .map(|(i, name)| dirent(name, 100 + i as u64))
        .collect();
    fx.put_dirents(4, 0, &entries[..DIRENTS_PER_BLOCK]);
    fx.put_dirents(5, 0, &entries[DIRENTS_PER_BLOCK..]);
    // a stale slot past the end of the directory
    fx.put_dirents(5, 7, &[dirent("ghost", 999)]);
    let fs = fx.mount();

    let listed = collect(&fs, DirCursor::new());
    assert_eq!(listed.len(), total);
    assert_eq!(listed.last().unwrap(), &(format!("f{}", total - 1), 100 + total as u64 - 1));

    let root = fs.stat(1).unwrap();
    let mut cursor = DirCursor::new();
    fs.read_dir(&root, &mut cursor, |_| true).unwrap();
    assert_eq!(cursor.pos(), (total * DIRENT_SIZE) as u64);
}

#[test]
fn skips_unmapped_directory_block() {
    let mut fx = Fixture::new(16);
    let size = 3 * 4096;
    fx.put_records(2, &[dir(1, size, &[4, 0, 6])]);
    fx.put_dirents(4, 0, &[dirent("first", 20)]);
    fx.put_dirents(6, 63, &[dirent("last", 21)]);
    let fs = fx.mount();
    let listed = collect(&fs, DirCursor::new());
    assert_eq!(listed, [("first".to_owned(), 20), ("last".to_owned(), 21)]);
}

#[test]
fn corrupt_slot_is_skipped_and_counted() {
    let mut fx = small_dir();
    let mut raw = [0u8; DIRENT_SIZE];
    dirent("c", 13).encode(&mut raw);
    raw[8..10].copy_from_slice(&300u16.to_le_bytes());
    fx.put_dirents(4, 1, &[DirEntry::decode(&raw)]);
    let fs = fx.mount();
    assert_eq!(collect(&fs, DirCursor::new()).len(), 2);
    assert_eq!(fs.stats().corrupt_dirents, 1);
}

#[test]
fn only_directories_enumerate() {
    let fs = small_dir().mount();
    let a = fs.stat(11).unwrap();
    let mut cursor = DirCursor::new();
    assert_eq!(
        fs.read_dir(&a, &mut cursor, |_| true).unwrap_err(),
        FsError::NotADirectory
    );
    assert_eq!(fs.lookup(&a, b"x").unwrap_err(), FsError::NotADirectory);
}

#[test]
fn entry_kind_comes_from_the_target_inode() {
    let fs = small_dir().mount();
    assert_eq!(fs.entry_kind(11).unwrap(), InodeKind::Regular);
    assert_eq!(fs.entry_kind(1).unwrap(), InodeKind::Directory);
}
