/*!
 * Collections
 *
 * Generic containers shared by higher layers:
 * - SlotList: stable handles with O(1) add/remove
 * - Hashtable: chained hashtable over a dense entry array
 * - SimpleHashtable: usize-keyed convenience wrapper
 *
 * None of these are internally synchronized.
 */

mod hashtable;
mod simple;
mod slot_list;

pub use hashtable::Hashtable;
pub use simple::{KeyValuePair, SimpleHashtable};
pub use slot_list::{SlotHandle, SlotList};
