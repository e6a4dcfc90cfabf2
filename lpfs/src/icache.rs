use alloc::collections::BTreeMap;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use spin::Mutex;

use crate::constant::Ino;
use crate::inode::{FsId, Inode};

/// Active inode objects of one mount, keyed by ino.
///
/// Slots hold weak references: dropping the last `Arc<Inode>` is the release.
#[derive(Debug)]
pub struct InodeCache {
    fs: FsId,
    slots: Mutex<Slots>,
}

#[derive(Debug)]
struct Slots {
    map: BTreeMap<Ino, Weak<Inode>>,
    high_water: usize,
}

impl InodeCache {
    const MIN_HIGH_WATER: usize = 64;

    pub fn new(fs: FsId) -> Self {
        Self {
            fs,
            slots: Mutex::new(Slots {
                map: BTreeMap::new(),
                high_water: Self::MIN_HIGH_WATER,
            }),
        }
    }

    /// returns the resident object, or a fresh `New` one and `true`
    pub fn acquire_or_create(&self, ino: Ino) -> (Arc<Inode>, bool) {
        let mut slots = self.slots.lock();
        if let Some(inode) = slots.map.get(&ino).and_then(Weak::upgrade) {
            return (inode, false);
        }
        let inode = Arc::new(Inode::new(ino, self.fs));
        slots.map.insert(ino, Arc::downgrade(&inode));
        if slots.map.len() > slots.high_water {
            slots.map.retain(|_, slot| slot.strong_count() > 0);
            slots.high_water = (slots.map.len() * 2).max(Self::MIN_HIGH_WATER);
        }
        (inode, true)
    }

    /// resident objects only, never creates
    pub fn lookup(&self, ino: Ino) -> Option<Arc<Inode>> {
        self.slots.lock().map.get(&ino).and_then(Weak::upgrade)
    }

    /// forgets an object that was never filled
    pub fn discard(&self, inode: &Arc<Inode>) {
        if inode.is_ready() {
            return;
        }
        let mut slots = self.slots.lock();
        let same = slots
            .map
            .get(&inode.ino())
            .is_some_and(|slot| slot.as_ptr() == Arc::as_ptr(inode));
        if same {
            slots.map.remove(&inode.ino());
        }
    }

    /// inos with at least one live reference
    pub fn active(&self) -> Vec<Ino> {
        self.slots
            .lock()
            .map
            .iter()
            .filter(|(_, slot)| slot.strong_count() > 0)
            .map(|(&ino, _)| ino)
            .collect()
    }
}
