//! Integration tests for allocation mode selection and the base fixture

use pandrs_testkit::environment::{AllocatorModeEnvironment, Environment};
use pandrs_testkit::memory::{AllocationMode, MemoryPoolConfig};
use pandrs_testkit::{BaseFixture, Error, ErrorKind};

#[test]
fn test_pool_mode_serves_fixture_allocations() {
    let mut env = AllocatorModeEnvironment::new("pool");
    env.set_up().unwrap();
    assert_eq!(env.active_mode(), Some(AllocationMode::Pooled));

    let fixture = BaseFixture::new(&env).unwrap();
    let mut blocks = Vec::new();
    for size in [16, 4096, 10_000] {
        let block = fixture.mr().allocate(size).unwrap();
        assert_eq!(block.size(), size);
        assert!(block.capacity() >= size);
        blocks.push(block);
    }
    for block in blocks {
        fixture.mr().deallocate(block).unwrap();
    }

    let stats = fixture.mr().stats().unwrap();
    assert_eq!(stats.total_allocations, 3);
    assert_eq!(stats.outstanding_allocations, 0);

    env.tear_down().unwrap();
    assert!(!fixture.mr().is_valid());
}

#[test]
fn test_all_canonical_modes() {
    for mode in AllocationMode::ALL {
        let mut env = AllocatorModeEnvironment::new(mode.as_str());
        env.set_up().unwrap();
        let fixture = BaseFixture::new(&env).unwrap();
        assert_eq!(fixture.mr().mode(), mode);
        let block = fixture.mr().allocate(1).unwrap();
        fixture.mr().deallocate(block).unwrap();
        env.tear_down().unwrap();
    }
}

#[test]
fn test_unknown_mode_is_a_configuration_error() {
    let mut env = AllocatorModeEnvironment::new("bogus");
    let err = env.set_up().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("bogus"));
    assert!(BaseFixture::new(&env).is_err());
}

#[test]
fn test_allocation_ids_are_unique() {
    let mut env = AllocatorModeEnvironment::new("managed");
    env.set_up().unwrap();
    let fixture = BaseFixture::new(&env).unwrap();

    let block = fixture.mr().allocate(8).unwrap();
    let id = block.id();
    fixture.mr().deallocate(block).unwrap();
    let again = fixture.mr().allocate(8).unwrap();
    assert_ne!(again.id(), id);
    fixture.mr().deallocate(again).unwrap();

    env.tear_down().unwrap();
}

#[test]
fn test_small_pool_limit() {
    let mut env = AllocatorModeEnvironment::new("pool").with_pool_config(MemoryPoolConfig {
        initial_size: 0,
        max_size: 4096,
        min_allocation_size: 4096,
    });
    env.set_up().unwrap();
    let fixture = BaseFixture::new(&env).unwrap();

    let block = fixture.mr().allocate(100).unwrap();
    assert!(matches!(fixture.mr().allocate(100), Err(Error::Allocation(_))));
    fixture.mr().deallocate(block).unwrap();

    env.tear_down().unwrap();
}

#[test]
fn test_managed_mode_lifecycle() {
    let mut env = AllocatorModeEnvironment::new("managed");
    env.set_up().unwrap();
    assert!(env.resource().is_some());
    env.tear_down().unwrap();
    assert!(env.resource().is_none());
}

#[test]
fn test_unsupported_mode_creates_no_resource() {
    let mut env = AllocatorModeEnvironment::new("unsupported");
    assert!(matches!(env.set_up(), Err(Error::InvalidAllocationMode(_))));
    assert!(env.resource().is_none());
    assert_eq!(env.active_mode(), None);
}
