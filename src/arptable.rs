use std::collections::HashMap;

use crate::addr::{Mac, Vip};

/// Static mapping from destination VIP to next-hop MAC. There is no
/// resolution protocol; the table is filled at construction and never
/// changes afterwards.
#[derive(Clone)]
pub struct ArpTable {
    map: HashMap<Vip, Mac>,
}

impl ArpTable {
    pub fn new() -> Self {
        ArpTable {
            map: HashMap::new(),
        }
    }

    pub fn query(&self, vip: &Vip) -> Option<&Mac> {
        self.map.get(vip)
    }

    pub fn insert(&mut self, vip: Vip, mac: Mac) {
        self.map.insert(vip, mac);
    }
}

impl Default for ArpTable {
    fn default() -> Self {
        ArpTable::new()
    }
}

impl FromIterator<(Vip, Mac)> for ArpTable {
    fn from_iter<I: IntoIterator<Item = (Vip, Mac)>>(iter: I) -> Self {
        ArpTable {
            map: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ArpTable;
    use crate::addr::{Mac, Vip};

    #[test]
    fn test_insert() {
        let mut arp = ArpTable::new();
        assert!(arp.query(&Vip::from("HOST_R")).is_none());

        arp.insert(Vip::from("HOST_R"), Mac::new(1, 2, 3, 4, 5, 6));

        assert_eq!(
            &Mac::new(1, 2, 3, 4, 5, 6),
            arp.query(&Vip::from("HOST_R")).unwrap()
        );
    }

    #[test]
    fn test_insert_overwrite() {
        let mut arp = ArpTable::new();

        arp.insert(Vip::from("HOST_R"), Mac::new(1, 2, 3, 4, 5, 6));
        assert_eq!(
            &Mac::new(1, 2, 3, 4, 5, 6),
            arp.query(&Vip::from("HOST_R")).unwrap()
        );

        arp.insert(Vip::from("HOST_R"), Mac::new(9, 8, 7, 6, 5, 4));
        assert_eq!(
            &Mac::new(9, 8, 7, 6, 5, 4),
            arp.query(&Vip::from("HOST_R")).unwrap()
        );
    }
}
