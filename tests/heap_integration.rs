//! Integration tests for the heap layer: on-disk format, file growth, and
//! scans through the buffer pool.

use std::sync::Arc;

use heapdb::buffer::{BufferPool, MemoryPool, Permissions};
use heapdb::catalog::Catalog;
use heapdb::datum::{Type, Value};
use heapdb::heap::{HeapFile, HeapPage, HeapScan};
use heapdb::storage::{page_size, HeapPageId};
use heapdb::tuple::{Tuple, TupleDesc};
use heapdb::tx::TransactionId;
use tempfile::{tempdir, TempDir};

struct Fixture {
    _dir: TempDir,
    desc: Arc<TupleDesc>,
    file: Arc<HeapFile>,
    pool: Arc<MemoryPool>,
    tid: TransactionId,
}

fn fixture(types: &[Type]) -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempdir().unwrap();
    let desc = Arc::new(TupleDesc::from_types(types.iter().copied()));
    let file = Arc::new(HeapFile::open(dir.path().join("table.dat"), desc.clone()).unwrap());

    let catalog = Arc::new(Catalog::new());
    catalog.register(file.clone()).unwrap();

    Fixture {
        _dir: dir,
        desc,
        file,
        pool: Arc::new(MemoryPool::new(catalog)),
        tid: TransactionId::fresh(),
    }
}

fn int_tuple(desc: &Arc<TupleDesc>, v: i32) -> Tuple {
    Tuple::new(desc.clone(), vec![Value::Int(v)]).unwrap()
}

fn scan_ints(fx: &Fixture) -> Vec<i32> {
    let mut scan = HeapScan::new(fx.file.clone(), fx.pool.clone(), fx.tid);
    scan.open().unwrap();
    let mut out = Vec::new();
    while scan.has_next().unwrap() {
        match scan.next().unwrap().value(0) {
            Some(Value::Int(v)) => out.push(*v),
            other => panic!("unexpected value {:?}", other),
        }
    }
    out
}

#[test]
fn on_disk_layout_is_bitmap_then_big_endian_slots() {
    let fx = fixture(&[Type::Int]);
    for v in [0x0102_0304, 0x0A0B_0C0D] {
        fx.file
            .insert_tuple(fx.pool.as_ref(), fx.tid, int_tuple(&fx.desc, v))
            .unwrap();
    }

    // The pool holds the dirty page; write it back to inspect raw bytes.
    let pid = HeapPageId::new(fx.file.table_id(), 0);
    let shared = fx.pool.get_page(fx.tid, pid, Permissions::ReadOnly).unwrap();
    fx.file.write_page(&shared.read()).unwrap();

    let raw = std::fs::read(fx.file.path()).unwrap();
    assert_eq!(raw.len(), page_size());

    // (4096 * 8) / 33 = 992 slots, 124 header bytes.
    let header_len = 124;
    assert_eq!(raw[0], 0b0000_0011);
    assert!(raw[1..header_len].iter().all(|&b| b == 0));
    assert_eq!(
        raw[header_len..header_len + 4],
        [0x01, 0x02, 0x03, 0x04]
    );
    assert_eq!(
        raw[header_len + 4..header_len + 8],
        [0x0A, 0x0B, 0x0C, 0x0D]
    );
    // Unused slots and padding are zero.
    assert!(raw[header_len + 8..].iter().all(|&b| b == 0));
}

#[test]
fn insert_grows_file_when_pages_fill() {
    let fx = fixture(&[Type::Int]);

    // One page holds 992 single-int rows; the 993rd forces an append.
    for v in 0..993 {
        fx.file
            .insert_tuple(fx.pool.as_ref(), fx.tid, int_tuple(&fx.desc, v))
            .unwrap();
    }
    assert_eq!(fx.file.num_pages(), 2);

    let scanned = scan_ints(&fx);
    assert_eq!(scanned.len(), 993);
    // Page order is insertion order here: 0..992 on page 0, 992 on page 1.
    assert_eq!(scanned, (0..993).collect::<Vec<i32>>());
}

#[test]
fn insert_reports_the_mutated_page_as_dirty() {
    let fx = fixture(&[Type::Int]);
    let mutated = fx
        .file
        .insert_tuple(fx.pool.as_ref(), fx.tid, int_tuple(&fx.desc, 7))
        .unwrap();
    assert_eq!(mutated.len(), 1);
    assert_eq!(mutated[0].read().dirtier(), Some(fx.tid));
}

#[test]
fn delete_frees_the_slot_for_reuse() {
    let fx = fixture(&[Type::Int]);
    for v in [1, 2, 3] {
        fx.file
            .insert_tuple(fx.pool.as_ref(), fx.tid, int_tuple(&fx.desc, v))
            .unwrap();
    }

    // Fetch the stored tuple for value 2 (slot 1) and delete it.
    let pid = HeapPageId::new(fx.file.table_id(), 0);
    let shared = fx.pool.get_page(fx.tid, pid, Permissions::ReadWrite).unwrap();
    let victim = shared.read().iter().nth(1).unwrap();
    drop(shared);
    fx.file
        .delete_tuple(fx.pool.as_ref(), fx.tid, &victim)
        .unwrap();

    assert_eq!(scan_ints(&fx), [1, 3]);

    // The freed slot is the lowest empty one, so the next insert reuses it.
    fx.file
        .insert_tuple(fx.pool.as_ref(), fx.tid, int_tuple(&fx.desc, 9))
        .unwrap();
    assert_eq!(scan_ints(&fx), [1, 9, 3]);
}

#[test]
fn scan_equals_union_of_page_contents_in_page_order() {
    let fx = fixture(&[Type::Int]);

    // Build two pages directly on disk, bypassing the pool.
    let mut expected = Vec::new();
    for (page_no, values) in [(0usize, vec![1, 2, 3]), (1, vec![4, 5])] {
        let pid = HeapPageId::new(fx.file.table_id(), page_no);
        let mut page =
            HeapPage::from_bytes(pid, &HeapPage::empty_page_data(), fx.desc.clone()).unwrap();
        for v in values {
            page.insert_tuple(int_tuple(&fx.desc, v)).unwrap();
            expected.push(v);
        }
        fx.file.write_page(&page).unwrap();
    }

    assert_eq!(fx.file.num_pages(), 2);
    assert_eq!(scan_ints(&fx), expected);
}

#[test]
fn scan_of_empty_file_is_empty() {
    let fx = fixture(&[Type::Int]);
    assert_eq!(fx.file.num_pages(), 0);
    assert!(scan_ints(&fx).is_empty());
}

#[test]
fn before_image_survives_later_mutation() {
    let fx = fixture(&[Type::Int]);
    fx.file
        .insert_tuple(fx.pool.as_ref(), fx.tid, int_tuple(&fx.desc, 1))
        .unwrap();

    let pid = HeapPageId::new(fx.file.table_id(), 0);
    let shared = fx.pool.get_page(fx.tid, pid, Permissions::ReadWrite).unwrap();
    shared.read().set_before_image().unwrap();

    {
        let mut page = shared.write();
        page.insert_tuple(int_tuple(&fx.desc, 2)).unwrap();
    }

    let before = shared.read().before_image().unwrap();
    assert_eq!(before.iter().count(), 1);
    assert_eq!(shared.read().iter().count(), 2);
}

#[test]
fn reopened_file_sees_persisted_tuples() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("table.dat");
    let desc = Arc::new(TupleDesc::from_types([Type::Int, Type::Varchar(8)]));

    let table_id = {
        let file = Arc::new(HeapFile::open(&path, desc.clone()).unwrap());
        let pid = HeapPageId::new(file.table_id(), 0);
        let mut page =
            HeapPage::from_bytes(pid, &HeapPage::empty_page_data(), desc.clone()).unwrap();
        page.insert_tuple(
            Tuple::new(desc.clone(), vec![Value::Int(1), Value::Varchar("one".into())])
                .unwrap(),
        )
        .unwrap();
        file.write_page(&page).unwrap();
        file.table_id()
    };

    let file = Arc::new(HeapFile::open(&path, desc).unwrap());
    assert_eq!(file.table_id(), table_id);
    assert_eq!(file.num_pages(), 1);

    let page = file.read_page(HeapPageId::new(table_id, 0)).unwrap();
    let tuples: Vec<Tuple> = page.iter().collect();
    assert_eq!(tuples.len(), 1);
    assert_eq!(tuples[0].value(1), Some(&Value::Varchar("one".into())));
}
