use loisdb_core::MemTableConfig;
use loisdb_core::lsm::{Key, MemTable, Value};
use tracing_subscriber::EnvFilter;

fn main() -> loisdb_core::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let memtable = MemTable::new(MemTableConfig::default());
    for i in 0..1000u32 {
        memtable.put(
            Key::from(format!("key{:05}", i).as_str()),
            Value::from_slice(&i.to_le_bytes()),
        )?;
    }
    memtable.delete(Key::from("key00042"))?;
    tracing::info!(
        entries = memtable.len(),
        bytes = memtable.size_bytes(),
        "memtable filled"
    );

    let sealed = memtable.seal()?;
    let absent = (0..1000)
        .filter(|i| !sealed.may_contain(&Key::from(format!("missing{}", i).as_str())))
        .count();
    tracing::info!(
        bits = sealed.bloom().num_bits(),
        probes = sealed.bloom().num_probes(),
        rejected = absent,
        "bloom filter rejected absent keys"
    );
    Ok(())
}
