//! dep — владение нижележащим sink/source.
//!
//! Каждый «writer/reader-над-X» держит зависимость на нижний объект:
//! - Owned — закрывается транзитивно при close() владельца;
//! - Borrowed — не трогается (закрывать его — дело внешнего кода).

use std::ops::{Deref, DerefMut};

pub enum Dep<'a, T> {
    Owned(T),
    Borrowed(&'a mut T),
}

impl<'a, T> Dep<'a, T> {
    #[inline]
    pub fn is_owned(&self) -> bool {
        matches!(self, Dep::Owned(_))
    }

    #[inline]
    pub fn get(&self) -> &T {
        match self {
            Dep::Owned(t) => t,
            Dep::Borrowed(t) => t,
        }
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        match self {
            Dep::Owned(t) => t,
            Dep::Borrowed(t) => t,
        }
    }

    /// Забрать владение. Паника для Borrowed — только для внутренних путей,
    /// где владение гарантировано конструктором.
    pub fn into_owned(self) -> T {
        match self {
            Dep::Owned(t) => t,
            Dep::Borrowed(_) => panic!("Dep::into_owned on borrowed dependency"),
        }
    }
}

impl<'a, T> From<T> for Dep<'a, T> {
    fn from(t: T) -> Self {
        Dep::Owned(t)
    }
}

impl<'a, T> From<&'a mut T> for Dep<'a, T> {
    fn from(t: &'a mut T) -> Self {
        Dep::Borrowed(t)
    }
}

impl<'a, T> Deref for Dep<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.get()
    }
}

impl<'a, T> DerefMut for Dep<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.get_mut()
    }
}
