mod rendering;
mod sync;
