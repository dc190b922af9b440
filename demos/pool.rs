use std::ptr::NonNull;

use rstl::{Map, Pool, PoolConfig, Set, TypedAllocator, tree::Less};
use tracing_subscriber::EnvFilter;

/// Prints the pool counters for the size class serving `bytes`.
fn print_pool(
  label: &str,
  pool: &Pool,
  bytes: usize,
) {
  println!(
    "[{}] heap_size = {}, arena_remaining = {}, free blocks of {} bytes = {}",
    label,
    pool.heap_size(),
    pool.arena_remaining(),
    bytes,
    pool.free_count(bytes),
  );
}

fn print_block(
  label: &str,
  bytes: usize,
  ptr: NonNull<u8>,
) {
  println!(
    "[{}] {} bytes at {:?} (addr % 8 = {})",
    label,
    bytes,
    ptr,
    ptr.as_ptr() as usize % 8
  );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  // RUST_LOG=rstl=trace shows refills, arena growth and OOM handling
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rstl=debug")))
    .init();

  let pool = Pool::with_config(PoolConfig::default())?;
  print_pool("start", &pool, 24);

  // --------------------------------------------------------------------
  // 1) First small allocation: 20 bytes round up to the 24-byte class.
  //    An empty pool requests an arena of 2 * 24 * 20 bytes, hands out
  //    one block and threads 19 onto the free list.
  // --------------------------------------------------------------------
  let first = pool.allocate(20)?;
  println!("\n[1] Allocate 20 bytes");
  print_block("1", 20, first);
  print_pool("1", &pool, 24);

  // --------------------------------------------------------------------
  // 2) Free it and allocate again: the block comes straight back.
  // --------------------------------------------------------------------
  unsafe { pool.deallocate(first, 20) };
  let again = pool.allocate(24)?;
  println!("\n[2] Free and reallocate in the same class");
  println!("[2] same block reused? {}", if again == first { "Yes" } else { "No" });
  unsafe { pool.deallocate(again, 24) };

  // --------------------------------------------------------------------
  // 3) Another size class is refilled from what is left of the arena.
  // --------------------------------------------------------------------
  let small = pool.allocate(8)?;
  println!("\n[3] Allocate 8 bytes from the remaining arena");
  print_block("3", 8, small);
  print_pool("3", &pool, 8);
  unsafe { pool.deallocate(small, 8) };

  // --------------------------------------------------------------------
  // 4) Large requests bypass the free lists entirely.
  // --------------------------------------------------------------------
  let large = pool.allocate(64 * 1024)?;
  println!("\n[4] Allocate 64 KiB (system path)");
  print_block("4", 64 * 1024, large);
  print_pool("4", &pool, 24);
  unsafe { pool.deallocate(large, 64 * 1024) };

  // --------------------------------------------------------------------
  // 5) Typed arrays go through the same pool.
  // --------------------------------------------------------------------
  let words: TypedAllocator<u32> = TypedAllocator::new(pool.clone());
  let array = words.allocate(6)?;
  unsafe {
    for i in 0..6 {
      array.as_ptr().add(i).write(i as u32 * 11);
    }
    println!("\n[5] [u32; 6] = {:?}", std::slice::from_raw_parts(array.as_ptr(), 6));
    words.deallocate(array, 6);
  }

  // --------------------------------------------------------------------
  // 6) Containers sharing the pool.
  // --------------------------------------------------------------------
  let mut set = Set::new_in(pool.clone(), Less);
  for n in [42, 7, 19, 7, 3, 88, 19] {
    set.insert(n)?;
  }
  println!("\n[6] set = {:?}", set);
  println!("[6] lower_bound(20) = {:?}", set.lower_bound(&20));

  let mut map = Map::new_in(pool.clone(), Less);
  for (word, len) in [("pool", 4), ("arena", 5), ("tree", 4)] {
    map.insert(word, len)?;
  }
  println!("[6] map = {:?}", map);

  set.remove(&42);
  println!("[6] after remove(42): {:?}", set);
  print_pool("end", &pool, 24);

  Ok(())
}
