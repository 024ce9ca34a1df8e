mod generic;

pub use generic::GenericRepository;
