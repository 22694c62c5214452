use tickfile::schema::TickRecord;
use tickfile_derive::TickRecord;

#[derive(TickRecord, Clone, Copy)]
#[repr(C)]
struct Trade {
  price: u64,
  qty: u32,
  #[tick(compression = "run_length")]
  venue: [u8; 32],
}

fn main() {
  let section = Trade::item_section();
  assert_eq!(section.fields.len(), 3);
  assert_eq!(section.item_size as usize, std::mem::size_of::<Trade>());
}
