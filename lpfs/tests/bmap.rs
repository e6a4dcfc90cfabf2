mod common;

use common::{dir, file, Fixture};
use lpfs::{
    constant::{BLOCK_SIZE, NULL},
    layout::BMAP_CAPACITY,
    FsError, Lpfs,
};

#[test]
fn translates_through_direct_map() {
    let mut fx = Fixture::new(128);
    fx.put_records(2, &[file(3, 3 * BLOCK_SIZE as u64, &[100, 101, 102])]);
    let fs = fx.mount();
    assert_eq!(fs.bmap(3, 0).unwrap(), 100);
    assert_eq!(fs.bmap(3, 1).unwrap(), 101);
    assert_eq!(fs.bmap(3, 3).unwrap_err(), FsError::OutOfRange);
    assert_eq!(fs.bmap(4, 0).unwrap_err(), FsError::NotFound);
}

#[test]
fn capacity_bounds_oversized_records() {
    let mut fx = Fixture::new(8);
    // size claims more blocks than the map can hold
    fx.put_records(2, &[file(3, u64::MAX / 2, &[5])]);
    let fs = fx.mount();
    assert_eq!(fs.bmap(3, BMAP_CAPACITY as u64 - 1).unwrap(), NULL);
    assert_eq!(
        fs.bmap(3, BMAP_CAPACITY as u64).unwrap_err(),
        FsError::OutOfRange
    );
    assert_eq!(Lpfs::max_file_size(), (BMAP_CAPACITY * BLOCK_SIZE) as u64);
}

#[test]
fn oversized_file_is_not_read_whole() {
    let mut fx = Fixture::new(8);
    fx.put_records(2, &[file(3, u64::MAX / 2, &[5])]);
    fx.put_data(5, &[9u8; 16]);
    let fs = fx.mount();
    let attr = fs.stat(3).unwrap();
    assert_eq!(fs.read_all(&attr).unwrap_err(), FsError::OutOfRange);

    let mut buf = [0u8; 16];
    assert_eq!(fs.read_at(&attr, 0, &mut buf).unwrap(), 16);
    assert_eq!(buf, [9u8; 16]);
}

#[test]
fn reads_across_blocks_and_holes() {
    let mut fx = Fixture::new(16);
    let size = 2 * BLOCK_SIZE as u64 + 100;
    fx.put_records(2, &[file(3, size, &[5, 0, 6])]);
    fx.put_data(5, &[1u8; BLOCK_SIZE]);
    fx.put_data(6, &[3u8; 200]);
    let fs = fx.mount();
    let attr = fs.stat(3).unwrap();

    let mut buf = vec![0xffu8; 20];
    assert_eq!(fs.read_at(&attr, BLOCK_SIZE as u64 - 10, &mut buf).unwrap(), 20);
    assert_eq!(&buf[..10], &[1u8; 10]);
    assert_eq!(&buf[10..], &[0u8; 10]);

    let all = fs.read_all(&attr).unwrap();
    assert_eq!(all.len() as u64, size);
    assert_eq!(&all[all.len() - 100..], &[3u8; 100]);

    assert_eq!(fs.read_at(&attr, size, &mut buf).unwrap(), 0);
    assert_eq!(fs.read_at(&attr, size - 4, &mut buf).unwrap(), 4);
}

#[test]
fn misplaced_record_is_inconsistent() {
    let mut fx = Fixture::new(8);
    fx.put_records(2, &[dir(1, 0, &[]), file(3, 10, &[5])]);
    fx.map_at(3, 2, 0);
    let fs = fx.mount();
    assert_eq!(fs.bmap(3, 0).unwrap_err(), FsError::Inconsistent);
}
