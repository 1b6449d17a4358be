use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

use super::*;

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

struct Foo;

impl Foo {
    fn do_something_with_cuz(&self, _cuz: Instance) -> bool {
        true
    }
}

// Invalid for auto-wiring as this requires an instance of its same type
struct Bar;

#[derive(Debug)]
struct Baz;

struct Tap {
    foo: Instance,
    num: AtomicI64,
}

impl Tap {
    fn new(foo: Instance, num: i64) -> Self {
        Self {
            foo,
            num: AtomicI64::new(num),
        }
    }

    fn set_num(&self, num: i64) {
        self.num.store(num, Ordering::SeqCst);
    }

    fn num(&self) -> i64 {
        self.num.load(Ordering::SeqCst)
    }
}

struct Goo {
    _num: i64,
}

fn catalog() -> Catalog {
    Catalog::new()
        .with_class(
            Class::new("Foo", || Foo)
                .method(
                    "doSomethingWithCuz",
                    [Parameter::class("cuz", "Cuz")],
                    |foo: &Foo, cuz: Instance| foo.do_something_with_cuz(cuz),
                )
                .invokable([Parameter::class("cuz", "Cuz")], |foo: &Foo, cuz: Instance| {
                    foo.do_something_with_cuz(cuz)
                }),
        )
        .with_class(Class::new("Bar", |_bar: Instance| Bar).param(Parameter::class("bar", "Bar")))
        .with_interface("Cuz")
        .with_class(Class::new("Baz", || Baz))
        .with_class(
            Class::new("Tap", |foo: Instance, num: i64| Tap::new(foo, num))
                .param(Parameter::class("foo", "Foo"))
                .param(Parameter::builtin("num").with_default(0))
                .method("setNum", [Parameter::builtin("num")], |tap: &Tap, num: i64| {
                    tap.set_num(num)
                }),
        )
        .with_class(Class::new("Goo", |num: i64| Goo { _num: num }).param(Parameter::builtin("num")))
        .with_class(
            Class::try_new("Broken", |missing: Instance| -> Result<Baz> {
                Err(ContainerError::custom(format!("cannot use {}", missing.class())))
            })
            .param(Parameter::class("missing", "Missing")),
        )
        .with_function(Function::new(
            "in_array",
            [
                Parameter::builtin("needle"),
                Parameter::builtin("haystack"),
                Parameter::builtin("strict").with_default(false),
            ],
            |needle: Value, haystack: Vec<Value>, _strict: bool| haystack.contains(&needle),
        ))
}

fn container() -> Container {
    Lazy::force(&TRACING);
    Container::new(catalog())
}

fn tap_num(instance: &Instance) -> i64 {
    instance.downcast_ref::<Tap>().map_or(-1, Tap::num)
}

#[test]
fn get_unknown_service() {
    let container = container();
    let err = container.get("FooBarBaz").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.container(), Some(container.id()));
}

#[test]
fn add_service_and_then_retrieve_instance() -> Result<()> {
    let container = container();
    let service = container.add("Foo", false, Binding::Empty);
    assert!(container.has("Foo"));

    let instance = container.get("Foo")?;
    assert_eq!(instance.class(), "Foo");
    assert!(instance.is::<Foo>());

    // registering again returns the existing record
    let again = container.add("Foo", true, Binding::Empty);
    assert!(again.ptr_eq(&service));
    assert!(again.instance().is_empty());
    assert!(!again.is_shared());
    Ok(())
}

#[test]
fn add_service_and_then_remove_it() {
    let container = container();
    container.add("Foo", false, Binding::Empty);
    assert!(container.has("Foo"));
    container.remove("Foo");
    assert!(!container.has("Foo"));

    // removing an unknown name is a no-op
    container.remove("Foo");
}

#[test]
fn unregistered_class_is_built_on_demand() -> Result<()> {
    let container = container();
    assert!(!container.has("Tap"));
    let tap = container.get("Tap")?;
    assert_eq!(tap_num(&tap), 0);
    assert!(!container.has("Tap"));
    Ok(())
}

#[test]
fn add_service_using_factory_function() -> Result<()> {
    let container = container();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    container.add(
        "Foo",
        false,
        Binding::factory(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Instance::new("Foo", Foo).into())
        }),
    );

    let first = container.get("Foo")?;
    let second = container.get("Foo")?;
    assert!(first.is::<Foo>());
    assert!(!first.ptr_eq(&second));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn factory_receives_the_container() -> Result<()> {
    let container = container();
    container.add("Baz", true, Binding::Empty);
    container.add(
        "Holder",
        false,
        Binding::factory(|c| Ok(c.get("Baz")?.into())),
    );
    let holder = container.get("Holder")?;
    assert!(holder.ptr_eq(&container.get("Baz")?));
    Ok(())
}

#[test]
fn add_service_using_concrete_object() -> Result<()> {
    let container = Arc::new(container());
    container.add(
        "Container",
        false,
        Instance::from_arc("Container", container.clone()),
    );

    let instance = container.get_as::<Container>("Container")?;
    assert!(Arc::ptr_eq(&instance, &container));
    drop(instance);

    // break the reference cycle
    container.remove("Container");
    Ok(())
}

#[test]
fn assignment_style_access() -> Result<()> {
    let container = container();
    container.set("Foo", Binding::Empty);
    assert!(container.get("Foo")?.is::<Foo>());
    container.remove("Foo");
    assert!(!container.has("Foo"));

    container.set(
        "Foo",
        Binding::factory(|_| Ok(Instance::new("Foo", Foo).into())),
    );
    assert!(container.get("Foo")?.is::<Foo>());
    Ok(())
}

#[test]
fn add_shared_service_and_then_retrieve_instance() -> Result<()> {
    let container = container();
    let service = container.add("Foo", true, Binding::Empty);

    let instance = container.get("Foo")?;
    let other = container.get("Foo")?;
    assert!(instance.ptr_eq(&other));
    assert!(service.instance().as_concrete().is_some_and(|i| i.ptr_eq(&instance)));
    Ok(())
}

#[test]
fn add_service_set_shared_flag_and_then_retrieve_instance() -> Result<()> {
    let container = container();
    let service = container.add("Foo", false, Binding::Empty);
    service.set_shared(true);

    let instance = container.get("Foo")?;
    let other = container.get("Foo")?;
    assert!(instance.ptr_eq(&other));
    assert!(service.instance().as_concrete().is_some_and(|i| i.ptr_eq(&instance)));
    Ok(())
}

#[test]
fn add_shared_service_using_factory_and_then_retrieve_instance() -> Result<()> {
    let container = container();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    container.add(
        "Foo",
        true,
        Binding::factory(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Instance::new("Foo", Foo).into())
        }),
    );

    let instance = container.get("Foo")?;
    let other = container.get("Foo")?;
    assert!(instance.ptr_eq(&other));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn concrete_object_is_always_the_same() -> Result<()> {
    let container = container();
    let baz = Instance::new("Baz", Baz);
    container.add("Baz", false, baz.clone());
    container.add("SharedBaz", true, baz.clone());

    assert!(container.get("Baz")?.ptr_eq(&baz));
    assert!(container.get("Baz")?.ptr_eq(&baz));
    assert!(container.get("SharedBaz")?.ptr_eq(&baz));
    assert!(container.get("SharedBaz")?.ptr_eq(&baz));
    Ok(())
}

#[test]
fn add_service_with_circular_reference() {
    let container = container();
    let service = container.add("Bar", false, Binding::Empty);

    let err = container.get("Bar").unwrap_err();
    assert!(err.is_circular(), "unexpected error: {err}");
    assert_eq!(err.container(), Some(container.id()));
    assert!(!service.is_locked());

    // the lock does not leak into the next resolution
    let err = container.get("Bar").unwrap_err();
    assert!(err.is_circular());
}

#[test]
fn unregistered_self_dependency_is_detected() {
    let container = container();
    let err = container.get("Bar").unwrap_err();
    assert!(err.is_circular());
}

#[test]
fn add_service_with_auto_wiring_dependencies() -> Result<()> {
    let container = container();
    container.add("Tap", false, Binding::Empty);
    let instance = container.get("Tap")?;
    assert_eq!(instance.class(), "Tap");
    assert_eq!(tap_num(&instance), 0);
    Ok(())
}

#[test]
fn non_shared_service_builds_a_new_instance_each_time() -> Result<()> {
    let container = container();
    container.add("Tap", false, Binding::Empty);
    let first = container.get("Tap")?;
    let second = container.get("Tap")?;
    assert!(first.is::<Tap>() && second.is::<Tap>());
    assert!(!first.ptr_eq(&second));
    Ok(())
}

#[test]
fn chained_service_configuration() -> Result<()> {
    let container = container();
    container
        .add("Tap", false, Binding::Empty)
        .set_shared(true)
        .with_argument("num", 4)
        .with_decorator("setNum", arguments! { "num" => 6 });

    let instance = container.get("Tap")?;
    assert_eq!(tap_num(&instance), 6);
    assert!(instance.ptr_eq(&container.get("Tap")?));
    Ok(())
}

#[test]
fn add_service_with_auto_wiring_dependencies_and_constructor_argument() -> Result<()> {
    let container = container();
    container
        .add("Tap", false, Binding::Empty)
        .with_argument("num", 5);
    let instance = container.get("Tap")?;
    assert_eq!(tap_num(&instance), 5);
    Ok(())
}

#[test]
fn add_service_with_constructor_arguments() -> Result<()> {
    let container = container();
    let foo = Instance::new("Foo", Foo);
    let service = container.add("Tap", false, Binding::Empty);
    service
        .with_argument("foo", foo.clone())
        .with_argument("num", 5);

    assert_eq!(service.argument("foo"), Some(Value::Object(foo.clone())));
    assert_eq!(service.argument("num"), Some(Value::Int(5)));

    let instance = container.get("Tap")?;
    assert_eq!(tap_num(&instance), 5);
    let tap = instance.downcast::<Tap>().ok_or_else(|| ContainerError::custom("not a Tap"))?;
    assert!(tap.foo.ptr_eq(&foo));
    Ok(())
}

#[test]
fn bound_object_of_another_class_is_ignored() -> Result<()> {
    let container = container();
    container
        .add("Tap", false, Binding::Empty)
        .with_argument("foo", Instance::new("Baz", Baz));
    let instance = container.get("Tap")?;
    let tap = instance.downcast::<Tap>().ok_or_else(|| ContainerError::custom("not a Tap"))?;
    assert_eq!(tap.foo.class(), "Foo");
    Ok(())
}

#[test]
fn missing_builtin_parameter_fails() {
    let container = container();
    let service = container.add("Goo", false, Binding::Empty);
    let err = container.get("Goo").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::UnresolvedParameter(p) if p == "num"));

    // a failed construction releases the service
    assert!(!service.is_locked());
    service.with_argument("num", 3);
    assert!(container.get("Goo").is_ok());
}

#[test]
fn failed_dependency_reports_the_parameter() {
    let container = container();
    let err = container.get("Broken").unwrap_err();
    match err.kind() {
        ErrorKind::DependencyFailed { parameter, source } => {
            assert_eq!(parameter, "missing");
            assert!(source.is_not_found());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn failing_constructor_propagates_its_error() {
    let container = container();
    container
        .add("Broken", false, Binding::Empty)
        .with_argument("missing", Instance::new("Missing", Baz));
    let err = container.get("Broken").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Custom(msg) if msg == "cannot use Missing"));
    assert_eq!(err.container(), Some(container.id()));
}

#[test]
fn add_service_with_decorator_methods() -> Result<()> {
    let container = container();
    let args = arguments! { "num" => 5 };
    let service = container.add("Tap", false, Binding::Empty);
    service.with_decorator("setNum", args.clone());
    assert_eq!(service.decorator("setNum"), Some(args));

    let instance = container.get("Tap")?;
    assert_eq!(tap_num(&instance), 5);
    Ok(())
}

#[test]
fn add_service_with_decorator_methods_that_does_not_exist() {
    let container = container();
    container
        .add("Tap", false, Binding::Empty)
        .with_decorator("putNum", arguments! { "num" => 5 });
    let err = container.get("Tap").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::MethodNotFound(m) if m == "putNum"));
}

#[test]
fn rebinding_a_decorator_replaces_its_arguments() -> Result<()> {
    let container = container();
    let service = container.add("Tap", false, Binding::Empty);
    service
        .with_decorator("setNum", arguments! { "num" => 1 })
        .with_decorator("setNum", arguments! { "num" => 7 });
    assert_eq!(service.decorators().len(), 1);
    assert_eq!(tap_num(&container.get("Tap")?), 7);
    Ok(())
}

#[test]
fn add_service_with_interface_and_implementation() -> Result<()> {
    let container = container();
    container.add("Cuz", false, "Baz");
    let instance = container.get("Cuz")?;
    assert_eq!(instance.class(), "Baz");
    assert!(instance.is::<Baz>());
    Ok(())
}

#[test]
fn add_service_with_interface_and_instance() -> Result<()> {
    let container = container();
    container.add("Baz", true, Binding::Empty);
    container.add("Cuz", true, "Baz");

    let instance = container.get("Cuz")?;
    assert!(instance.is::<Baz>());
    assert!(instance.ptr_eq(&container.get("Cuz")?));
    assert!(instance.ptr_eq(&container.get("Baz")?));
    Ok(())
}

#[test]
fn unresolvable_bindings_are_not_instantiable() {
    let container = container();
    container.add("config", false, Binding::Empty);
    container.add("Cuz", false, "Nothing");
    container.add("answer", false, Binding::factory(|_| Ok(Value::Int(42))));

    for name in ["config", "Cuz", "answer"] {
        let err = container.get(name).unwrap_err();
        assert!(
            matches!(err.kind(), ErrorKind::NotInstantiable(n) if n == name),
            "unexpected error for {name}: {err}"
        );
    }
}

#[test]
fn get_as_checks_the_type() {
    let container = container();
    assert!(container.get_as::<Foo>("Foo").is_ok());
    let err = container.get_as::<Baz>("Foo").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::TypeMismatch { .. }));
}

#[test]
fn add_service_then_resolve_to_callable() -> Result<()> {
    let container = container();
    container.add("Baz", true, Binding::Empty);
    container.add("Cuz", true, "Baz");

    let closure = Function::closure(
        [Parameter::class("baz", "Baz"), Parameter::class("cuz", "Cuz")],
        |baz: Instance, _cuz: Instance| baz,
    );
    let ret = container.call(closure, arguments! {})?;
    assert!(ret.as_object().is_some_and(|i| i.is::<Baz>()));

    let closure = Function::closure(
        [Parameter::class("baz", "Baz"), Parameter::builtin("num")],
        |_baz: Instance, num: i64| num,
    );
    let ret = container.call(closure, arguments! { "num" => 10 })?;
    assert_eq!(ret, Value::Int(10));

    let foo = Instance::new("Foo", Foo);
    let ret = container.call((foo.clone(), "doSomethingWithCuz"), arguments! {})?;
    assert_eq!(ret, Value::Bool(true));

    let ret = container.call(foo.clone(), arguments! {})?;
    assert_eq!(ret, Value::Bool(true));

    let haystack: Vec<Value> = vec![1.into(), 3.into(), 5.into(), 7.into()];
    let ret = container.call("in_array", arguments! { "needle" => 3, "haystack" => haystack.clone() })?;
    assert_eq!(ret, Value::Bool(true));

    // named arguments are matched by name, not position
    let ret = container.call("in_array", arguments! { "haystack" => haystack, "needle" => 4 })?;
    assert_eq!(ret, Value::Bool(false));
    Ok(())
}

#[test]
fn call_failures() {
    let container = container();
    container.add("Baz", true, Binding::Empty);

    let closure = Function::closure(
        [Parameter::class("baz", "Baz"), Parameter::builtin("num")],
        |baz: Instance, _num: i64| baz,
    );
    let err = container.call(closure, arguments! {}).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::UnresolvedParameter(p) if p == "num"));

    let foo = Instance::new("Foo", Foo);
    let err = container.call((foo, "thisDoesNotExist"), arguments! {}).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::MethodNotFound(_)));

    let err = container.call("thisIsJustAnString!", arguments! {}).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotCallable));

    let err = container.call(Instance::new("Baz", Baz), arguments! {}).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotCallable));

    let err = container
        .call("in_array", arguments! { "needle" => 3, "haystack" => "abc" })
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidArgument { expected: "list", .. }));
    assert_eq!(err.container(), Some(container.id()));
}

#[test]
fn integers_widen_to_float_only_when_exact() {
    assert_eq!(f64::from_value(Value::Int(1 << 53)).ok(), Some(9007199254740992.0));
    assert_eq!(f64::from_value(Value::Int(-3)).ok(), Some(-3.0));

    let err = f64::from_value(Value::Int((1 << 53) + 1)).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidArgument { expected: "float", .. }));
    assert!(f64::from_value(Value::Int(i64::MIN)).is_err());
}

#[derive(Default)]
struct Counters {
    bootstrapped: AtomicUsize,
    booted: AtomicUsize,
    registered: AtomicUsize,
}

struct FooProvider(Arc<Counters>);

impl Provider for FooProvider {
    fn bootstrap(&self, _container: &Container) {
        self.0.bootstrapped.fetch_add(1, Ordering::SeqCst);
    }

    fn provides(&self, name: &str) -> bool {
        ["Foo", "Bar"].contains(&name)
    }

    fn register(&self, container: &Container) {
        self.0.registered.fetch_add(1, Ordering::SeqCst);
        container.add("Foo", true, Binding::Empty);
    }

    fn boot(&self, _container: &Container) {
        self.0.booted.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn service_provider() -> Result<()> {
    let container = container();
    let counters = Arc::new(Counters::default());
    container.provider(FooProvider(counters.clone()));
    assert_eq!(counters.bootstrapped.load(Ordering::SeqCst), 1);
    assert_eq!(counters.booted.load(Ordering::SeqCst), 0);

    assert!(container.has("Foo"));
    assert!(container.has("Bar"));
    assert!(!container.has("Baz"));

    let instance = container.get("Foo")?;
    assert!(instance.is::<Foo>());
    assert!(instance.ptr_eq(&container.get("Foo")?));

    // claimed by the provider, but never registered
    let err = container.get("Bar").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotProvided(n) if n == "Bar"));

    assert_eq!(counters.booted.load(Ordering::SeqCst), 1);
    assert_eq!(counters.registered.load(Ordering::SeqCst), 1);
    Ok(())
}

enum First {}
enum Second {}

#[test]
fn first_matching_provider_wins() -> Result<()> {
    let container = container();
    let boots = Arc::new(AtomicUsize::new(0));
    let counter = boots.clone();
    container
        .provider(ListProvider::<First>::tagged(["Cuz"], |c| {
            c.add("Cuz", false, "Baz");
        }))
        .provider(
            ListProvider::<Second>::tagged(["Cuz", "Tap"], |c| {
                c.add("Tap", false, Binding::Empty).with_argument("num", 9);
            })
            .on_boot(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

    assert!(container.get("Cuz")?.is::<Baz>());
    assert_eq!(boots.load(Ordering::SeqCst), 0);

    assert_eq!(tap_num(&container.get("Tap")?), 9);
    assert_eq!(boots.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn shared_service_across_threads() -> Result<()> {
    let container = container();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    container.add(
        "Tap",
        true,
        Binding::factory(move |c| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Instance::new("Tap", Tap::new(c.get("Foo")?, 0)).into())
        }),
    );

    // no instance exists before the threads race for the first construction
    let container = &container;
    let instances = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|_| scope.spawn(move || container.get("Tap")))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("resolution thread panicked"))
            .collect::<Result<Vec<_>>>()
    })?;

    let first = &instances[0];
    assert!(instances.iter().all(|i| i.ptr_eq(first)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn container_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Container>();
    assert_send_sync::<Service>();
}
